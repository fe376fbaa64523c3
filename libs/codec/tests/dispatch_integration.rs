//! Integration tests for end-to-end dispatch workflows
//!
//! These tests exercise the full build-then-dispatch path: registration,
//! classification, strategy selection and probing, across the typed
//! dispatcher and the polymorphic registry, and verify that every selected
//! strategy answers identical probes identically.

use codec::{
    DispatchConfig, Dispatcher, HandleMessage, Message, MessageHandler, MessageVtable,
    PolyHandler, PolyRegistry, StrategyKind,
};
use types::define_message;

define_message! { pub struct Heartbeat {} => id = 1; }
define_message! { pub struct Trade { pub price: i64 } => id = 2; }
define_message! { pub struct Quote { pub bid: i64 } => id = 3; }
define_message! { pub struct Snapshot { pub depth: u32 } => id = 4000; }

// Three fragment types sharing one wire id; registration order defines
// their duplicate offsets.
define_message! { pub struct FragFirst {} => id = 5; }
define_message! { pub struct FragSecond {} => id = 5; }
define_message! { pub struct FragThird {} => id = 5; }

define_message! { pub struct Negotiated {} => dynamic_id = || 700; }

#[derive(Default)]
struct Tracker {
    matched: Vec<&'static str>,
    unmatched: usize,
}

impl MessageHandler for Tracker {
    type Out = ();

    fn on_unmatched(&mut self, _msg: &dyn Message) {
        self.unmatched += 1;
    }
}

macro_rules! track {
    ($($ty:ident),*) => {
        $(impl HandleMessage<$ty> for Tracker {
            fn on_message(&mut self, _msg: &$ty) {
                self.matched.push(stringify!($ty));
            }
            fn on_message_type(&mut self) {
                self.matched.push(stringify!($ty));
            }
        })*
    };
}

track!(Heartbeat, Trade, Quote, Snapshot, FragFirst, FragSecond, FragThird, Negotiated);

#[test]
fn dense_protocol_dispatches_through_direct_table() {
    let dispatcher = Dispatcher::builder()
        .register::<Heartbeat>()
        .register::<Trade>()
        .register::<Quote>()
        .build()
        .expect("build dispatcher");
    assert_eq!(dispatcher.active_strategy(), StrategyKind::Direct);
    assert!(dispatcher.has_unique_ids());

    let mut handler = Tracker::default();
    let trade = Trade { price: 100 };
    dispatcher.dispatch(2, 0, &trade, &mut handler);
    dispatcher.dispatch(1, 0, &Heartbeat::default(), &mut handler);
    assert_eq!(handler.matched, vec!["Trade", "Heartbeat"]);
    assert_eq!(handler.unmatched, 0);
}

#[test]
fn duplicate_run_offsets_follow_registration_order() {
    let dispatcher = Dispatcher::builder()
        .register::<FragFirst>()
        .register::<FragSecond>()
        .register::<FragThird>()
        .build()
        .expect("build dispatcher");
    // All ids equal: weakly sorted, so a binary engine with run resolution.
    assert_eq!(dispatcher.active_strategy(), StrategyKind::BinarySearchWeak);
    assert!(!dispatcher.has_unique_ids());
    assert_eq!(dispatcher.count(5), 3);

    let mut handler = Tracker::default();
    assert!(dispatcher.dispatch_type(5, 0, &mut handler));
    assert!(dispatcher.dispatch_type(5, 1, &mut handler));
    assert!(dispatcher.dispatch_type(5, 2, &mut handler));
    // Offset equal to the run length is a miss, not a wrap-around.
    assert!(!dispatcher.dispatch_type(5, 3, &mut handler));
    assert_eq!(handler.matched, vec!["FragFirst", "FragSecond", "FragThird"]);
}

#[test]
fn sparse_sorted_ids_use_binary_search() {
    let dispatcher = Dispatcher::builder()
        .register::<Heartbeat>()
        .register::<Quote>()
        .register::<Snapshot>()
        .build()
        .expect("build dispatcher");
    assert_eq!(
        dispatcher.active_strategy(),
        StrategyKind::BinarySearchStrong
    );

    let mut handler = Tracker::default();
    assert!(dispatcher.dispatch_type(4000, 0, &mut handler));
    assert!(dispatcher.dispatch_type(1, 0, &mut handler));
    assert!(!dispatcher.dispatch_type(2, 0, &mut handler));
    assert_eq!(handler.matched, vec!["Snapshot", "Heartbeat"]);
}

#[test]
fn runtime_resolved_ids_fall_back_to_linear_scan() {
    let dispatcher = Dispatcher::builder()
        .register::<Quote>()
        .register::<Negotiated>()
        .register::<Heartbeat>()
        .build()
        .expect("build dispatcher");
    assert_eq!(dispatcher.active_strategy(), StrategyKind::LinearStrong);

    let mut handler = Tracker::default();
    // The dynamic id resolves through its callable at probe time.
    assert!(dispatcher.dispatch_type(700, 0, &mut handler));
    assert!(dispatcher.dispatch_type(3, 0, &mut handler));
    assert_eq!(handler.matched, vec!["Negotiated", "Quote"]);
    assert_eq!(dispatcher.count(12345), 0);
}

#[test]
fn forced_linear_strategy_agrees_with_the_natural_one() {
    let natural = Dispatcher::builder()
        .register::<Heartbeat>()
        .register::<Quote>()
        .register::<Snapshot>()
        .build()
        .expect("natural build");
    let forced = Dispatcher::builder()
        .register::<Heartbeat>()
        .register::<Quote>()
        .register::<Snapshot>()
        .with_config(DispatchConfig {
            strategy_override: Some(StrategyKind::LinearWeak),
            ..DispatchConfig::default()
        })
        .build()
        .expect("forced build");
    assert_ne!(natural.active_strategy(), forced.active_strategy());

    // Same probes, same outcomes; only the algorithm differs.
    for id in [0u16, 1, 2, 3, 4, 3999, 4000, 4001] {
        for offset in [0u16, 1, 2] {
            let mut a = Tracker::default();
            let mut b = Tracker::default();
            assert_eq!(
                natural.dispatch_type(id, offset, &mut a),
                forced.dispatch_type(id, offset, &mut b),
                "divergence at id={id} offset={offset}"
            );
            assert_eq!(a.matched, b.matched);
        }
    }
}

#[test]
fn polymorphic_registry_matches_the_typed_dispatcher() {
    struct VtableTracker {
        matched: Vec<&'static str>,
        unmatched: usize,
    }

    impl PolyHandler for VtableTracker {
        fn on_message(&mut self, _msg: &dyn Message, vtable: &'static MessageVtable) {
            self.matched.push(vtable.name);
        }
        fn on_unmatched(&mut self, _msg: &dyn Message) {
            self.unmatched += 1;
        }
    }

    let typed = Dispatcher::builder()
        .register::<Heartbeat>()
        .register::<Trade>()
        .register::<Quote>()
        .build()
        .expect("typed build");
    let poly = PolyRegistry::builder()
        .register::<Heartbeat>()
        .register::<Trade>()
        .register::<Quote>()
        .build()
        .expect("poly build");
    assert_eq!(typed.active_strategy(), poly.active_strategy());

    let mut typed_handler = Tracker::default();
    let mut poly_handler = VtableTracker {
        matched: Vec::new(),
        unmatched: 0,
    };
    let trade = Trade { price: -5 };
    typed.dispatch(2, 0, &trade, &mut typed_handler);
    poly.dispatch(2, 0, &trade, &mut poly_handler);
    typed.dispatch(9, 0, &trade, &mut typed_handler);
    poly.dispatch(9, 0, &trade, &mut poly_handler);

    assert_eq!(typed_handler.matched, poly_handler.matched);
    assert_eq!(typed_handler.unmatched, poly_handler.unmatched);
}

#[test]
fn fifty_type_registry_dispatches_every_registered_id() {
    // One macro-defined block per id keeps each type distinct.
    macro_rules! bulk {
        ($($name:ident = $id:literal),* $(,)?) => {
            $(define_message! { pub struct $name {} => id = $id; })*
            track!($($name),*);

            fn build_bulk() -> Dispatcher<Tracker> {
                Dispatcher::builder()
                    $(.register::<$name>())*
                    .build()
                    .expect("bulk build")
            }

            fn bulk_ids() -> Vec<u16> {
                vec![$($id),*]
            }
        };
    }

    bulk! {
        B00 = 107, B01 = 3, B02 = 9911, B03 = 42, B04 = 512,
        B05 = 7, B06 = 60000, B07 = 255, B08 = 1024, B09 = 11,
        B10 = 13, B11 = 17, B12 = 19, B13 = 23, B14 = 29,
        B15 = 31, B16 = 37, B17 = 41, B18 = 43, B19 = 47,
        B20 = 53, B21 = 59, B22 = 61, B23 = 67, B24 = 71,
        B25 = 73, B26 = 79, B27 = 83, B28 = 89, B29 = 97,
        B30 = 101, B31 = 103, B32 = 109, B33 = 113, B34 = 127,
        B35 = 131, B36 = 137, B37 = 139, B38 = 149, B39 = 151,
        B40 = 157, B41 = 163, B42 = 167, B43 = 173, B44 = 179,
        B45 = 181, B46 = 191, B47 = 193, B48 = 197, B49 = 199,
    }

    let dispatcher = build_bulk();
    // Registration order is not sorted, ids are unique.
    assert_eq!(dispatcher.active_strategy(), StrategyKind::LinearStrong);

    let mut handler = Tracker::default();
    for id in bulk_ids() {
        assert!(dispatcher.dispatch_type(id, 0, &mut handler), "id {id} lost");
    }
    assert_eq!(handler.matched.len(), 50);
    assert!(!dispatcher.dispatch_type(2, 0, &mut handler));
    assert_eq!(dispatcher.count(2), 0);
}

#[test]
fn fifty_runtime_id_types_dispatch_linearly() {
    // Every id resolves through a callable, so sortedness cannot be proven
    // and the whole set must go through the linear engine.
    macro_rules! bulk_dynamic {
        ($($name:ident = $id:literal),* $(,)?) => {
            $(define_message! { pub struct $name {} => dynamic_id = || $id; })*
            track!($($name),*);

            fn build_bulk_dynamic() -> Dispatcher<Tracker> {
                Dispatcher::builder()
                    $(.register::<$name>())*
                    .build()
                    .expect("dynamic bulk build")
            }

            fn bulk_dynamic_ids() -> Vec<u16> {
                vec![$($id),*]
            }
        };
    }

    bulk_dynamic! {
        D00 = 1000, D01 = 1001, D02 = 1002, D03 = 1003, D04 = 1004,
        D05 = 1005, D06 = 1006, D07 = 1007, D08 = 1008, D09 = 1009,
        D10 = 1010, D11 = 1011, D12 = 1012, D13 = 1013, D14 = 1014,
        D15 = 1015, D16 = 1016, D17 = 1017, D18 = 1018, D19 = 1019,
        D20 = 1020, D21 = 1021, D22 = 1022, D23 = 1023, D24 = 1024,
        D25 = 1025, D26 = 1026, D27 = 1027, D28 = 1028, D29 = 1029,
        D30 = 1030, D31 = 1031, D32 = 1032, D33 = 1033, D34 = 1034,
        D35 = 1035, D36 = 1036, D37 = 1037, D38 = 1038, D39 = 1039,
        D40 = 1040, D41 = 1041, D42 = 1042, D43 = 1043, D44 = 1044,
        D45 = 1045, D46 = 1046, D47 = 1047, D48 = 1048, D49 = 1049,
    }

    let dispatcher = build_bulk_dynamic();
    // Resolved ids happen to be sorted, but runtime resolution forbids the
    // binary engines anyway.
    assert_eq!(dispatcher.active_strategy(), StrategyKind::LinearStrong);
    assert!(dispatcher.has_unique_ids());

    let mut handler = Tracker::default();
    for id in bulk_dynamic_ids() {
        assert!(dispatcher.dispatch_type(id, 0, &mut handler), "id {id} lost");
    }
    assert_eq!(handler.matched.len(), 50);
    assert!(!dispatcher.dispatch_type(999, 0, &mut handler));
    assert_eq!(dispatcher.count(999), 0);
}

#[test]
fn empty_registry_never_matches() {
    let dispatcher: Dispatcher<Tracker> = Dispatcher::builder().build().expect("empty build");
    assert_eq!(dispatcher.active_strategy(), StrategyKind::None);

    let mut handler = Tracker::default();
    for id in 0..32u16 {
        assert!(!dispatcher.dispatch_type(id, 0, &mut handler));
    }
    assert!(handler.matched.is_empty());
}
