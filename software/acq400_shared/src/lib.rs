//! Wire formats and service port map shared by hosts that talk to an
//! acq400 appliance.
//!
//! Every appliance exposes a set of independent TCP services:
//!
//! * one key=value configuration service per site, at [`SITE0_PORT`]` + site`
//! * a status telemetry stream at [`TELEMETRY_PORT`]
//! * one raw sample stream per channel, at [`DATA0_PORT`]` + channel`
//! * segment load/show services for multi-segment captures
#![allow(clippy::needless_range_loop)]

pub mod sample;
pub mod sitelist;
pub mod status;

pub use sample::{ChannelBuffer, SampleWidth};
pub use sitelist::{parse_site_list, SiteEntry, SiteListError};
pub use status::{AcqState, ParseStatusError, StatusVector};

/// Key=value configuration service for site 0; site N listens on `SITE0_PORT + N`
pub const SITE0_PORT: u16 = 4220;

/// Segment definitions are written here, one line per segment
pub const SEGMENT_LOAD_PORT: u16 = 4250;

/// Segment definitions are read back from here until the appliance closes
pub const SEGMENT_SHOW_PORT: u16 = 4251;

/// Transient status telemetry stream
pub const TELEMETRY_PORT: u16 = 2235;

/// Channel data service base; channel N (1-based) listens on `DATA0_PORT + N`
pub const DATA0_PORT: u16 = 53000;

/// Derive To/From with an added "Unknown" variant catch-all for converting
/// from numerical values that do not match a valid variant in order to
/// avoid either panicking or cumbersome error handling.
#[macro_export]
macro_rules! enum_with_unknown {
    (
        $( #[$enum_attr:meta] )*
        pub enum $name:ident($ty:ty) {
            $(
              $( #[$variant_attr:meta] )*
              $variant:ident = $value:expr
            ),+ $(,)?
        }
    ) => {
        #[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
        $( #[$enum_attr] )*
        pub enum $name {
            $(
              $( #[$variant_attr] )*
              $variant
            ),*,
            /// Catch-all for values that do not match a variant
            Unknown($ty)
        }

        impl ::core::convert::From<$ty> for $name {
            fn from(value: $ty) -> Self {
                match value {
                    $( $value => $name::$variant ),*,
                    other => $name::Unknown(other)
                }
            }
        }

        impl ::core::convert::From<$name> for $ty {
            fn from(value: $name) -> Self {
                match value {
                    $( $name::$variant => $value ),*,
                    $name::Unknown(other) => other
                }
            }
        }
    }
}
