//! Raw HCI event taxonomy and the LE-scan command helpers built on
//! [`crate::sock::hci::HciSocket`].
//!
//! Grounded on `original_source/api/tinyb_hci/HCITypes.hpp`'s
//! `HCI_Event_Types`/`LE_Address_T` enums for the event and address-type
//! codes, generalized from that header's single `LE_Advertising_Report`
//! case to the fuller set of LE meta sub-events and command events this
//! crate's adapter/device state machine needs.

pub mod event;
pub mod monitor;

pub use event::HciEvent;
pub use monitor::HciMonitor;
