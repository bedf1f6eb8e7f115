// SPDX-License-Identifier: GPL-3.0-only

//! udev property names and values the daemon inspects

/// Set to "1" on optical drives
pub const ID_CDROM: &str = "ID_CDROM";

/// Filesystem type, present once a data filesystem was probed
pub const ID_FS_TYPE: &str = "ID_FS_TYPE";

/// Filesystem UUID
pub const ID_FS_UUID: &str = "ID_FS_UUID";

/// Filesystem label
pub const ID_FS_LABEL: &str = "ID_FS_LABEL";

/// Number of audio tracks on the inserted disc
pub const ID_CDROM_MEDIA_TRACK_COUNT_AUDIO: &str = "ID_CDROM_MEDIA_TRACK_COUNT_AUDIO";

/// Set to "1" when the eject button was pressed
pub const DISK_EJECT_REQUEST: &str = "DISK_EJECT_REQUEST";

/// Kernel driver of the USB interface
pub const ID_USB_DRIVER: &str = "ID_USB_DRIVER";

/// "disk" or "partition"
pub const DEVTYPE: &str = "DEVTYPE";

/// Partition type code (MBR hex code or GPT GUID)
pub const ID_PART_ENTRY_TYPE: &str = "ID_PART_ENTRY_TYPE";

pub const USB_STORAGE_DRIVER: &str = "usb-storage";
pub const DEVTYPE_PARTITION: &str = "partition";

pub const ACTION_ADD: &str = "add";
pub const ACTION_REMOVE: &str = "remove";

/// Kernel short-name prefix of removable SCSI disks
pub const USB_SYSNAME_PREFIX: &str = "sd";

/// Partition types that never carry music
pub const IGNORED_PARTITION_TYPES: [&str; 5] = [
    // empty MBR entry
    "0x0",
    // EFI system partition (MBR)
    "0xef",
    // Linux swap (MBR)
    "0x82",
    // EFI system partition (GPT)
    "c12a7328-f81f-11d2-ba4b-00a0c93ec93b",
    // Linux swap (GPT)
    "0657fd6d-a4ab-43c4-84e5-0933c84b4f4f",
];
