//! Management command opcodes and the typed request/response pairs this
//! crate issues.
//!
//! Opcode values mirror the Linux kernel's `include/net/bluetooth/mgmt.h`.
//! Grounded on `original_source/src/direct_bt/DBTAdapter.cpp`'s calls
//! into its `DBTManager` (`mgmt.setMode(dev_id, MgmtOpcode::SET_POWERED,
//! ...)`, `mgmt.startDiscovery(dev_id)`) for which commands this crate's
//! adapter/device layer actually needs; the fuller kernel opcode set is
//! recorded here for completeness but only the ones spec.md's operations
//! use are ever encoded by [`crate::adapter::Adapter`]/
//! [`crate::device::Device`].

/// Management command opcodes (`mgmt.h`'s `MGMT_OP_*`).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u16)]
pub enum MgmtOpcode {
    ReadVersion = 0x0001,
    ReadCommands = 0x0002,
    ReadIndexList = 0x0003,
    ReadInfo = 0x0004,
    SetPowered = 0x0005,
    SetDiscoverable = 0x0006,
    SetConnectable = 0x0007,
    SetBondable = 0x0009,
    SetLocalName = 0x000f,
    SetLe = 0x000d,
    Disconnect = 0x0014,
    StartDiscovery = 0x0023,
    StopDiscovery = 0x0024,
    AddDevice = 0x0033,
    RemoveDevice = 0x0034,
    LoadConnParam = 0x0035,
}

/// `mgmt.h`'s `MGMT_OP_ADD_DEVICE` action byte: `0x02` requests the
/// kernel actively connect, as opposed to `0x01` (auto-connect on
/// advertisement) or `0x00` (background-scan only).
const ADD_DEVICE_ACTION_CONNECT: u8 = 0x02;
/// `0x01`: add to the whitelist for auto-connect on advertisement,
/// without an immediate active connection attempt.
const ADD_DEVICE_ACTION_AUTOCONNECT: u8 = 0x01;

/// One outgoing management command: an opcode, the controller index it
/// targets (`0xffff` for controller-agnostic commands like
/// `ReadIndexList`), and its parameter bytes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MgmtCommand {
    pub opcode: MgmtOpcode,
    pub controller_index: u16,
    pub params: Vec<u8>,
}

impl MgmtCommand {
    pub fn new(opcode: MgmtOpcode, controller_index: u16, params: Vec<u8>) -> Self {
        MgmtCommand {
            opcode,
            controller_index,
            params,
        }
    }

    pub fn read_index_list() -> Self {
        Self::new(MgmtOpcode::ReadIndexList, 0xffff, Vec::new())
    }

    pub fn read_info(controller_index: u16) -> Self {
        Self::new(MgmtOpcode::ReadInfo, controller_index, Vec::new())
    }

    pub fn set_powered(controller_index: u16, on: bool) -> Self {
        Self::new(MgmtOpcode::SetPowered, controller_index, vec![on as u8])
    }

    pub fn set_le(controller_index: u16, on: bool) -> Self {
        Self::new(MgmtOpcode::SetLe, controller_index, vec![on as u8])
    }

    /// `val(1) + timeout-seconds(2)`; `timeout` of `0` means "until
    /// explicitly turned off".
    pub fn set_discoverable(controller_index: u16, on: bool, timeout_secs: u16) -> Self {
        let mut params = vec![on as u8];
        params.extend_from_slice(&timeout_secs.to_le_bytes());
        Self::new(MgmtOpcode::SetDiscoverable, controller_index, params)
    }

    pub fn set_bondable(controller_index: u16, on: bool) -> Self {
        Self::new(MgmtOpcode::SetBondable, controller_index, vec![on as u8])
    }

    /// `name(249)` + `short_name(11)`, each a NUL-terminated/padded UTF-8
    /// string truncated to fit.
    pub fn set_local_name(controller_index: u16, name: &str, short_name: &str) -> Self {
        let mut params = vec![0u8; 249 + 11];
        let name_bytes = name.as_bytes();
        let n = name_bytes.len().min(248);
        params[0..n].copy_from_slice(&name_bytes[..n]);
        let short_bytes = short_name.as_bytes();
        let s = short_bytes.len().min(10);
        params[249..249 + s].copy_from_slice(&short_bytes[..s]);
        Self::new(MgmtOpcode::SetLocalName, controller_index, params)
    }

    /// Adds `address` to the kernel's auto-connect whitelist
    /// (`MGMT_OP_ADD_DEVICE`, action `0x01`), as opposed to
    /// [`MgmtCommand::connect`]'s immediate active-connect action.
    pub fn add_device_to_whitelist(controller_index: u16, address: crate::Address, address_type: u8) -> Self {
        let mut params = address.to_le_bytes().to_vec();
        params.push(address_type);
        params.push(ADD_DEVICE_ACTION_AUTOCONNECT);
        Self::new(MgmtOpcode::AddDevice, controller_index, params)
    }

    pub fn remove_device_from_whitelist(controller_index: u16, address: crate::Address, address_type: u8) -> Self {
        let mut params = address.to_le_bytes().to_vec();
        params.push(address_type);
        Self::new(MgmtOpcode::RemoveDevice, controller_index, params)
    }

    /// `MGMT_OP_LOAD_CONN_PARAM` for a single device: a one-entry array of
    /// `address(6) + address_type(1) + min_interval(2) + max_interval(2) +
    /// latency(2) + supervision_timeout(2)`, prefixed by its entry count.
    pub fn upload_connection_parameters(
        controller_index: u16,
        address: crate::Address,
        address_type: u8,
        params: crate::config::ConnParams,
    ) -> Self {
        let mut buf = 1u16.to_le_bytes().to_vec();
        buf.extend_from_slice(&address.to_le_bytes());
        buf.push(address_type);
        buf.extend_from_slice(&params.encode());
        Self::new(MgmtOpcode::LoadConnParam, controller_index, buf)
    }

    pub fn start_discovery(controller_index: u16, address_type_mask: u8) -> Self {
        Self::new(
            MgmtOpcode::StartDiscovery,
            controller_index,
            vec![address_type_mask],
        )
    }

    pub fn stop_discovery(controller_index: u16, address_type_mask: u8) -> Self {
        Self::new(
            MgmtOpcode::StopDiscovery,
            controller_index,
            vec![address_type_mask],
        )
    }

    pub fn disconnect(controller_index: u16, address: crate::Address, address_type: u8) -> Self {
        let mut params = address.to_le_bytes().to_vec();
        params.push(address_type);
        Self::new(MgmtOpcode::Disconnect, controller_index, params)
    }

    /// Requests the controller actively connect to `address`, the
    /// management-socket equivalent of HCI `create-connection`.
    pub fn connect(controller_index: u16, address: crate::Address, address_type: u8) -> Self {
        let mut params = address.to_le_bytes().to_vec();
        params.push(address_type);
        params.push(ADD_DEVICE_ACTION_CONNECT);
        Self::new(MgmtOpcode::AddDevice, controller_index, params)
    }

    pub(crate) fn to_frame(&self) -> crate::sock::mgmt::MgmtFrame {
        crate::sock::mgmt::MgmtFrame {
            opcode: self.opcode as u16,
            controller_index: self.controller_index,
            payload: self.params.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_powered_encodes_single_byte_param() {
        let cmd = MgmtCommand::set_powered(0, true);
        assert_eq!(cmd.params, vec![1]);
        assert_eq!(cmd.to_frame().opcode, MgmtOpcode::SetPowered as u16);
    }

    #[test]
    fn disconnect_encodes_address_and_type() {
        let addr: crate::Address = "AA:BB:CC:DD:EE:FF".parse().unwrap();
        let cmd = MgmtCommand::disconnect(0, addr, 0x01);
        assert_eq!(cmd.params.len(), 7);
        assert_eq!(cmd.params[6], 0x01);
    }

    #[test]
    fn set_discoverable_encodes_flag_and_timeout() {
        let cmd = MgmtCommand::set_discoverable(0, true, 120);
        assert_eq!(cmd.params, vec![0x01, 0x78, 0x00]);
    }

    #[test]
    fn set_local_name_pads_and_truncates_into_fixed_fields() {
        let cmd = MgmtCommand::set_local_name(0, "thermometer", "therm");
        assert_eq!(cmd.params.len(), 249 + 11);
        assert_eq!(&cmd.params[0..11], b"thermometer");
        assert_eq!(cmd.params[11], 0);
        assert_eq!(&cmd.params[249..254], b"therm");
    }

    #[test]
    fn whitelist_add_uses_autoconnect_action() {
        let addr: crate::Address = "AA:BB:CC:DD:EE:FF".parse().unwrap();
        let cmd = MgmtCommand::add_device_to_whitelist(0, addr, 0x01);
        assert_eq!(cmd.params[7], ADD_DEVICE_ACTION_AUTOCONNECT);
        assert_ne!(ADD_DEVICE_ACTION_AUTOCONNECT, ADD_DEVICE_ACTION_CONNECT);
    }

    #[test]
    fn whitelist_remove_encodes_address_and_type() {
        let addr: crate::Address = "AA:BB:CC:DD:EE:FF".parse().unwrap();
        let cmd = MgmtCommand::remove_device_from_whitelist(0, addr, 0x01);
        assert_eq!(cmd.params.len(), 7);
    }

    #[test]
    fn upload_connection_parameters_prefixes_single_entry_count() {
        let addr: crate::Address = "AA:BB:CC:DD:EE:FF".parse().unwrap();
        let cmd = MgmtCommand::upload_connection_parameters(
            0,
            addr,
            0x01,
            crate::config::ConnParams::default(),
        );
        assert_eq!(&cmd.params[0..2], &1u16.to_le_bytes());
        assert_eq!(cmd.params.len(), 2 + 6 + 1 + 8);
    }
}
