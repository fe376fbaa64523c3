//! Message Definition Macro
//!
//! Provides the `define_message!` macro for declaratively defining wire
//! message types with their trait plumbing generated.
//!
//! ## Purpose
//!
//! Eliminates repetitive boilerplate across message definitions while
//! ensuring:
//! - Consistent `Message` / `ProtocolMessage` implementations
//! - A uniform `from_wire` constructor for the factory path
//! - Correct wiring of static vs. dynamic id resolution
//!
//! ## Usage Example
//!
//! ```rust
//! use types::define_message;
//!
//! define_message! {
//!     /// Market trade report.
//!     pub struct Trade {
//!         pub price: i64,
//!         pub volume: i64,
//!     } => id = 1;
//! }
//!
//! define_message! {
//!     /// Vendor extension whose id is assigned at runtime.
//!     pub struct VendorBlob {
//!         pub raw: Vec<u8>,
//!     } => dynamic_id = || 200;
//! }
//! ```

/// Generate a message struct together with its `Message` and
/// `ProtocolMessage` implementations.
///
/// Two forms are accepted:
/// - `=> id = EXPR` registers a build-time constant wire id,
/// - `=> dynamic_id = EXPR` takes a zero-argument callable resolving the id
///   at runtime (the set containing such a type always classifies as
///   unsorted and dispatches linearly).
///
/// The generated `from_wire` constructor returns `Default::default()`; the
/// message's identity lives in its type, field decoding happens after
/// construction.
#[macro_export]
macro_rules! define_message {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $($(#[$field_meta:meta])* $field_vis:vis $field:ident : $field_ty:ty),* $(,)?
        } => id = $id:expr $(;)?
    ) => {
        $(#[$meta])*
        #[derive(Debug, Default, Clone, PartialEq)]
        $vis struct $name {
            $($(#[$field_meta])* $field_vis $field: $field_ty,)*
        }

        impl $crate::Message for $name {
            fn wire_id(&self) -> $crate::MsgId {
                $id
            }

            fn type_name(&self) -> &'static str {
                ::core::stringify!($name)
            }

            fn as_any(&self) -> &dyn ::core::any::Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn ::core::any::Any {
                self
            }
        }

        impl $crate::ProtocolMessage for $name {
            const WIRE_ID: ::core::option::Option<$crate::MsgId> =
                ::core::option::Option::Some($id);
            const NAME: &'static str = ::core::stringify!($name);

            fn current_wire_id() -> $crate::MsgId {
                $id
            }

            fn from_wire(_id: $crate::MsgId, _offset: u16) -> Self {
                <Self as ::core::default::Default>::default()
            }
        }
    };
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $($(#[$field_meta:meta])* $field_vis:vis $field:ident : $field_ty:ty),* $(,)?
        } => dynamic_id = $id_fn:expr $(;)?
    ) => {
        $(#[$meta])*
        #[derive(Debug, Default, Clone, PartialEq)]
        $vis struct $name {
            $($(#[$field_meta])* $field_vis $field: $field_ty,)*
        }

        impl $crate::Message for $name {
            fn wire_id(&self) -> $crate::MsgId {
                <Self as $crate::ProtocolMessage>::current_wire_id()
            }

            fn type_name(&self) -> &'static str {
                ::core::stringify!($name)
            }

            fn as_any(&self) -> &dyn ::core::any::Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn ::core::any::Any {
                self
            }
        }

        impl $crate::ProtocolMessage for $name {
            const WIRE_ID: ::core::option::Option<$crate::MsgId> =
                ::core::option::Option::None;
            const NAME: &'static str = ::core::stringify!($name);

            fn current_wire_id() -> $crate::MsgId {
                ($id_fn)()
            }

            fn from_wire(_id: $crate::MsgId, _offset: u16) -> Self {
                <Self as ::core::default::Default>::default()
            }
        }
    };
}
