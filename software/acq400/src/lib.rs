//! Host-side control client for acq400 data acquisition appliances.
//!
//! An [`Acq400`] handle discovers the appliance's site services, follows its
//! status telemetry on a background thread, lets the caller block until the
//! appliance arms or a capture stops, and then uploads each channel's samples
//! over that channel's data service.
//!
//! Everything that touches the network goes through a [`socket::Connector`],
//! so the same handle runs against real hardware ([`socket::TcpConnector`])
//! or an in-process imitation ([`socket::MockupConnector`]).

pub mod channel;
pub mod context;
pub mod device;
pub mod error;
pub mod logging;
pub mod sink;
pub mod site;
pub mod socket;
pub mod status;

pub use acq400_shared::{AcqState, ChannelBuffer, SampleWidth, SiteEntry, StatusVector};
pub use context::{DeviceCtx, PortMap};
pub use device::{Acq400, ChannelSelection};
pub use error::{Acq400Error, Result};
pub use status::CancelReason;
