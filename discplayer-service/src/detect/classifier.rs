// SPDX-License-Identifier: GPL-3.0-only

//! Decides which notifications concern an audio disc or a USB music partition

use discplayer_types::properties::{
    ACTION_ADD, ACTION_REMOVE, DEVTYPE, DEVTYPE_PARTITION, ID_CDROM, ID_FS_TYPE, ID_PART_ENTRY_TYPE,
    ID_USB_DRIVER, IGNORED_PARTITION_TYPES, USB_STORAGE_DRIVER, USB_SYSNAME_PREFIX,
};
use discplayer_types::{Device, DeviceEvent, DeviceKind, EventType, RawNotification};
use tracing::{debug, trace};

/// Classify one notification; `None` means "not for us"
pub fn classify(raw: &RawNotification) -> Option<DeviceEvent> {
    let devnode = raw.devnode.as_deref().filter(|node| !node.is_empty())?;

    let kind = if is_disc(raw) {
        DeviceKind::Disc
    } else if is_usb_partition(raw) {
        DeviceKind::Usb
    } else {
        trace!(sysname = %raw.sysname, action = %raw.action, "Ignoring notification");
        return None;
    };

    let device = Device::new(kind, devnode, raw.sysname.clone(), raw.properties.clone());
    let event_type = match kind {
        DeviceKind::Disc => disc_event_type(&raw.action, &device)?,
        DeviceKind::Usb => usb_event_type(&raw.action)?,
    };

    debug!(device = %devnode, %kind, %event_type, "Classified hotplug notification");
    Some(DeviceEvent::new(event_type, device))
}

// An optical drive without a probed filesystem: empty tray or audio disc.
fn is_disc(raw: &RawNotification) -> bool {
    raw.property(ID_CDROM) == Some("1") && raw.property(ID_FS_TYPE).is_none()
}

fn is_usb_partition(raw: &RawNotification) -> bool {
    if raw.property(ID_USB_DRIVER) != Some(USB_STORAGE_DRIVER)
        || raw.property(DEVTYPE) != Some(DEVTYPE_PARTITION)
    {
        return false;
    }

    match raw.property(ID_PART_ENTRY_TYPE) {
        None => return false,
        Some(part_type) if is_ignored_partition_type(part_type) => return false,
        Some(_) => {}
    }

    if !raw.sysname.starts_with(USB_SYSNAME_PREFIX) {
        debug!(
            sysname = %raw.sysname,
            "USB partition does not match the expected kernel naming pattern"
        );
        return false;
    }
    true
}

fn is_ignored_partition_type(part_type: &str) -> bool {
    IGNORED_PARTITION_TYPES
        .iter()
        .any(|ignored| ignored.eq_ignore_ascii_case(part_type))
}

fn disc_event_type(action: &str, device: &Device) -> Option<EventType> {
    if action == ACTION_REMOVE || device.eject_requested() {
        return Some(EventType::Removed);
    }
    match device.audio_track_count() {
        Some(count) if count > 0 => Some(EventType::Added),
        _ => {
            debug!(device = %device.path(), "Disc without audio tracks, ignoring");
            None
        }
    }
}

fn usb_event_type(action: &str) -> Option<EventType> {
    match action {
        ACTION_ADD => Some(EventType::Added),
        ACTION_REMOVE => Some(EventType::Removed),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use discplayer_types::properties::{DISK_EJECT_REQUEST, ID_CDROM_MEDIA_TRACK_COUNT_AUDIO};

    fn drive(action: &str) -> RawNotification {
        RawNotification::new(action, "/dev/sr0", "sr0").with_property(ID_CDROM, "1")
    }

    fn usb(action: &str, sysname: &str, part_type: &str) -> RawNotification {
        RawNotification::new(action, format!("/dev/{sysname}"), sysname)
            .with_property(ID_USB_DRIVER, USB_STORAGE_DRIVER)
            .with_property(DEVTYPE, DEVTYPE_PARTITION)
            .with_property(ID_PART_ENTRY_TYPE, part_type)
    }

    fn event_type(raw: &RawNotification) -> Option<EventType> {
        classify(raw).map(|event| event.event_type)
    }

    #[test]
    fn unrelated_block_devices_are_ignored() {
        let nvme = RawNotification::new("change", "/dev/nvme0n1p1", "nvme0n1p1")
            .with_property(DEVTYPE, DEVTYPE_PARTITION)
            .with_property(ID_FS_TYPE, "ext4");
        assert!(classify(&nvme).is_none());
        assert!(classify(&RawNotification::new("add", "/dev/loop0", "loop0")).is_none());
    }

    #[test]
    fn disc_change_events() {
        let eject = drive("change").with_property(DISK_EJECT_REQUEST, "1");
        assert_eq!(event_type(&eject), Some(EventType::Removed));

        let inserted = drive("change").with_property(ID_CDROM_MEDIA_TRACK_COUNT_AUDIO, "8");
        let event = classify(&inserted).unwrap();
        assert_eq!(event.event_type, EventType::Added);
        assert_eq!(event.device.kind(), DeviceKind::Disc);
        assert_eq!(event.device.path(), "/dev/sr0");
        assert_eq!(event.device.audio_track_count(), Some(8));

        assert_eq!(event_type(&drive("change")), None);
    }

    #[test]
    fn disc_remove_action_wins() {
        let removed = drive("remove").with_property(ID_CDROM_MEDIA_TRACK_COUNT_AUDIO, "8");
        assert_eq!(event_type(&removed), Some(EventType::Removed));
    }

    #[test]
    fn data_discs_are_not_audio_discs() {
        let data = drive("change")
            .with_property(ID_FS_TYPE, "iso9660")
            .with_property(ID_CDROM_MEDIA_TRACK_COUNT_AUDIO, "1");
        assert!(classify(&data).is_none());

        let zero = drive("change").with_property(ID_CDROM_MEDIA_TRACK_COUNT_AUDIO, "0");
        assert!(classify(&zero).is_none());
    }

    #[test]
    fn usb_partition_actions() {
        assert_eq!(event_type(&usb("add", "sdb1", "0xc")), Some(EventType::Added));
        assert_eq!(event_type(&usb("remove", "sdb1", "0xc")), Some(EventType::Removed));
        assert_eq!(event_type(&usb("change", "sdb1", "0xc")), None);
        assert_eq!(event_type(&usb("bind", "sdb1", "0xc")), None);

        let event = classify(&usb("add", "sdb1", "0xc")).unwrap();
        assert_eq!(event.device.kind(), DeviceKind::Usb);
        assert_eq!(event.device.sysname(), "sdb1");
    }

    #[test]
    fn usb_system_partitions_are_rejected() {
        for part_type in [
            "0x0",
            "0xef",
            "0x82",
            "C12A7328-F81F-11D2-BA4B-00A0C93EC93B",
            "0657fd6d-a4ab-43c4-84e5-0933c84b4f4f",
        ] {
            assert!(classify(&usb("add", "sdb1", part_type)).is_none(), "{part_type}");
        }
        assert!(classify(&usb("add", "sdb1", "")).is_none());
    }

    #[test]
    fn usb_requires_partition_driver_and_name() {
        let whole_disk = usb("add", "sdb", "0xc").with_property(DEVTYPE, "disk");
        assert!(classify(&whole_disk).is_none());

        let uas = usb("add", "sdb1", "0xc").with_property(ID_USB_DRIVER, "uas");
        assert!(classify(&uas).is_none());

        assert!(classify(&usb("add", "mmcblk0p1", "0xc")).is_none());
    }

    #[test]
    fn nodeless_notifications_are_ignored() {
        let mut raw = usb("add", "sdb1", "0xc");
        raw.devnode = None;
        assert!(classify(&raw).is_none());
    }
}
