//! A closed enumeration of the Bluetooth SIG-assigned service and
//! characteristic UUIDs this crate recognizes, plus lookup helpers from a
//! discovered [`crate::uuid::Uuid`] back to a known name.
//!
//! Grounded on the enum-plus-`from_u16` idiom already used for
//! [`crate::mgmt::command::MgmtOpcode`] and [`crate::hci::event::HciEvent`],
//! applied here to the handful of 16-bit UUIDs a GATT central needs to
//! recognize to decode [`crate::values`] structures, and on
//! `bluez-async`'s convention (noted in `uuid.rs`) of keying known
//! services/characteristics by their expanded `uuid::Uuid` form.

use crate::uuid::Uuid;

/// A standard primary service this crate has a name and/or value parser
/// for.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KnownService {
    GenericAccess,
    DeviceInformation,
    BatteryService,
    HeartRate,
    HealthThermometer,
}

impl KnownService {
    pub fn uuid(self) -> Uuid {
        Uuid::U16(match self {
            KnownService::GenericAccess => 0x1800,
            KnownService::DeviceInformation => 0x180a,
            KnownService::BatteryService => 0x180f,
            KnownService::HeartRate => 0x180d,
            KnownService::HealthThermometer => 0x1809,
        })
    }

    pub fn from_uuid(uuid: Uuid) -> Option<KnownService> {
        match uuid {
            Uuid::U16(0x1800) => Some(KnownService::GenericAccess),
            Uuid::U16(0x180a) => Some(KnownService::DeviceInformation),
            Uuid::U16(0x180f) => Some(KnownService::BatteryService),
            Uuid::U16(0x180d) => Some(KnownService::HeartRate),
            Uuid::U16(0x1809) => Some(KnownService::HealthThermometer),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            KnownService::GenericAccess => "Generic Access",
            KnownService::DeviceInformation => "Device Information",
            KnownService::BatteryService => "Battery Service",
            KnownService::HeartRate => "Heart Rate",
            KnownService::HealthThermometer => "Health Thermometer",
        }
    }
}

/// A standard characteristic this crate has a name and/or value parser
/// for, spanning the services in [`KnownService`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KnownCharacteristic {
    DeviceName,
    Appearance,
    PeripheralPreferredConnectionParameters,
    SystemId,
    ModelNumberString,
    SerialNumberString,
    FirmwareRevisionString,
    HardwareRevisionString,
    SoftwareRevisionString,
    ManufacturerNameString,
    RegulatoryCertificationDataList,
    PnpId,
    BatteryLevel,
    TemperatureMeasurement,
    TemperatureType,
    HeartRateMeasurement,
}

impl KnownCharacteristic {
    pub fn uuid(self) -> Uuid {
        use KnownCharacteristic::*;
        Uuid::U16(match self {
            DeviceName => 0x2a00,
            Appearance => 0x2a01,
            PeripheralPreferredConnectionParameters => 0x2a04,
            SystemId => 0x2a23,
            ModelNumberString => 0x2a24,
            SerialNumberString => 0x2a25,
            FirmwareRevisionString => 0x2a26,
            HardwareRevisionString => 0x2a27,
            SoftwareRevisionString => 0x2a28,
            ManufacturerNameString => 0x2a29,
            RegulatoryCertificationDataList => 0x2a2a,
            PnpId => 0x2a50,
            BatteryLevel => 0x2a19,
            TemperatureMeasurement => 0x2a1c,
            TemperatureType => 0x2a1d,
            HeartRateMeasurement => 0x2a37,
        })
    }

    pub fn from_uuid(uuid: Uuid) -> Option<KnownCharacteristic> {
        use KnownCharacteristic::*;
        Some(match uuid {
            Uuid::U16(0x2a00) => DeviceName,
            Uuid::U16(0x2a01) => Appearance,
            Uuid::U16(0x2a04) => PeripheralPreferredConnectionParameters,
            Uuid::U16(0x2a23) => SystemId,
            Uuid::U16(0x2a24) => ModelNumberString,
            Uuid::U16(0x2a25) => SerialNumberString,
            Uuid::U16(0x2a26) => FirmwareRevisionString,
            Uuid::U16(0x2a27) => HardwareRevisionString,
            Uuid::U16(0x2a28) => SoftwareRevisionString,
            Uuid::U16(0x2a29) => ManufacturerNameString,
            Uuid::U16(0x2a2a) => RegulatoryCertificationDataList,
            Uuid::U16(0x2a50) => PnpId,
            Uuid::U16(0x2a19) => BatteryLevel,
            Uuid::U16(0x2a1c) => TemperatureMeasurement,
            Uuid::U16(0x2a1d) => TemperatureType,
            Uuid::U16(0x2a37) => HeartRateMeasurement,
            _ => return None,
        })
    }
}

/// Builds a [`crate::values::DeviceInformation`] out of whatever Device
/// Information characteristic values the caller already read, skipping
/// any that failed to decode rather than failing the whole assembly.
pub fn assemble_device_information(
    values: &[(KnownCharacteristic, Vec<u8>)],
) -> crate::values::DeviceInformation {
    use crate::values::device_information::{decode_string, PnpId, SystemId};
    use KnownCharacteristic::*;

    let mut info = crate::values::DeviceInformation::default();
    for (characteristic, value) in values {
        match characteristic {
            SystemId => info.system_id = SystemId::decode(value),
            ModelNumberString => info.model_number = Some(decode_string(value)),
            SerialNumberString => info.serial_number = Some(decode_string(value)),
            FirmwareRevisionString => info.firmware_revision = Some(decode_string(value)),
            HardwareRevisionString => info.hardware_revision = Some(decode_string(value)),
            SoftwareRevisionString => info.software_revision = Some(decode_string(value)),
            ManufacturerNameString => info.manufacturer_name = Some(decode_string(value)),
            RegulatoryCertificationDataList => info.regulatory_data = Some(value.clone()),
            PnpId => info.pnp_id = PnpId::decode(value),
            _ => {}
        }
    }
    info
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_service_round_trips_through_uuid() {
        for service in [
            KnownService::GenericAccess,
            KnownService::DeviceInformation,
            KnownService::BatteryService,
            KnownService::HeartRate,
            KnownService::HealthThermometer,
        ] {
            assert_eq!(KnownService::from_uuid(service.uuid()), Some(service));
        }
    }

    #[test]
    fn known_characteristic_round_trips_through_uuid() {
        let battery = KnownCharacteristic::BatteryLevel;
        assert_eq!(
            KnownCharacteristic::from_uuid(battery.uuid()),
            Some(battery)
        );
    }

    #[test]
    fn unrecognized_uuid_is_not_known() {
        assert_eq!(KnownService::from_uuid(Uuid::U16(0xdead)), None);
        assert_eq!(KnownCharacteristic::from_uuid(Uuid::U16(0xbeef)), None);
    }

    #[test]
    fn assembles_device_information_from_partial_values() {
        let values = vec![
            (
                KnownCharacteristic::ManufacturerNameString,
                b"Acme Corp".to_vec(),
            ),
            (KnownCharacteristic::ModelNumberString, b"X100".to_vec()),
        ];
        let info = assemble_device_information(&values);
        assert_eq!(info.manufacturer_name.as_deref(), Some("Acme Corp"));
        assert_eq!(info.model_number.as_deref(), Some("X100"));
        assert_eq!(info.serial_number, None);
    }
}
