//! Fixed paths and command lines of the target device

use crate::remote::sequencer::CommandSequence;

/// Image shown while the tablet sleeps
pub const ACTIVE_IMAGE: &str = "/usr/share/remarkable/suspended.png";

/// Writable upload target for the image before it is moved into place
pub const STAGING_IMAGE: &str = "/home/root/suspended.png";

/// Rotation hook script
pub const ROTATION_SCRIPT: &str = "/home/root/change-sleep.sh";

/// Log the rotation script appends to
pub const ROTATION_LOG: &str = "/home/root/change-sleep.log";

/// Folder the rotation script picks images from
pub const SCREENS_DIR: &str = "/home/root/screens";

/// systemd drop-in directory of the display service
pub const OVERRIDE_DIR: &str = "/etc/systemd/system/xochitl.service.d";

/// Drop-in installed by the rotation hook
pub const OVERRIDE_FILE: &str = "/etc/systemd/system/xochitl.service.d/change-sleep.conf";

/// Display service that renders the sleep screen
pub const SERVICE: &str = "xochitl";

/// Original start command of the display service
pub const SERVICE_EXEC: &str = "/usr/bin/xochitl --system";

pub fn remount_rw() -> String {
    "mount -o remount,rw /".to_string()
}

pub fn move_file(src: &str, dst: &str) -> String {
    format!("mv {} {}", src, dst)
}

pub fn restart_service() -> String {
    format!("systemctl restart {}", SERVICE)
}

pub fn reload_units() -> String {
    "systemctl daemon-reexec".to_string()
}

pub fn make_executable(path: &str) -> String {
    format!("chmod +x {}", path)
}

pub fn strip_carriage_returns(path: &str) -> String {
    format!("sed -i 's/\\r$//' {}", path)
}

pub fn remove_file(path: &str) -> String {
    format!("rm -f {}", path)
}

pub fn remove_tree(path: &str) -> String {
    format!("rm -rf {}", path)
}

/// Path of a screen inside the rotation folder
pub fn screen_path(file_name: &str) -> String {
    format!("{}/{}", SCREENS_DIR, file_name)
}

/// Remount, move the staged image over the active one, restart the display.
///
/// One compound line: if the remount or the move fails the service is not
/// restarted. Root stays read-write afterwards.
pub fn activation_sequence() -> CommandSequence {
    CommandSequence::atomic([
        remount_rw(),
        move_file(STAGING_IMAGE, ACTIVE_IMAGE),
        restart_service(),
    ])
}

/// Post-upload steps of the rotation hook install
pub fn install_rotation_sequence() -> CommandSequence {
    CommandSequence::best_effort([
        make_executable(ROTATION_SCRIPT),
        strip_carriage_returns(ROTATION_SCRIPT),
        reload_units(),
        restart_service(),
    ])
}

/// Removal of everything the rotation hook installed. The override and the
/// script go before the restart so the service comes back unmodified.
pub fn uninstall_rotation_sequence() -> CommandSequence {
    CommandSequence::best_effort([
        remove_file(OVERRIDE_FILE),
        remove_file(ROTATION_SCRIPT),
        remove_file(ROTATION_LOG),
        remove_tree(SCREENS_DIR),
        reload_units(),
        restart_service(),
    ])
}

/// Rotate now instead of waiting for the next sleep cycle
pub fn test_rotation_sequence() -> CommandSequence {
    CommandSequence::best_effort([ROTATION_SCRIPT.to_string(), restart_service()])
}
