//! Generated files uploaded by the rotation hook

use crate::deploy::device::{
    ACTIVE_IMAGE, ROTATION_LOG, ROTATION_SCRIPT, SCREENS_DIR, SERVICE_EXEC,
};

/// POSIX sh script that copies a random PNG of the screens folder over the
/// active sleep image. An empty folder is logged and exits 0.
pub fn rotation_script() -> String {
    format!(
        r#"#!/bin/sh
set -e
FOLDER={screens}
DEST={dest}
LOG={log}

echo "$(date '+%F %T') - start" >> "$LOG"

set -- "$FOLDER"/*.png
[ -e "$1" ] || {{ echo "no png in $FOLDER" >> "$LOG"; exit 0; }}

count=$#
idx=$((RANDOM % count + 1))
file=$(eval echo \${{$idx}})

mount -o remount,rw /
cp "$file" "$DEST"

echo "$(date '+%F %T') - set $(basename "$file")" >> "$LOG"
exit 0
"#,
        screens = SCREENS_DIR,
        dest = ACTIVE_IMAGE,
        log = ROTATION_LOG,
    )
}

/// systemd drop-in: clear the start command, then run the rotation script
/// before exec'ing the display service as usual
pub fn service_override() -> String {
    format!(
        "[Service]\nExecStart=\nExecStart=/bin/sh -c '{}; exec {}'\n",
        ROTATION_SCRIPT, SERVICE_EXEC
    )
}
