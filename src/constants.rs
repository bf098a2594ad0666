// Capture configuration defaults
pub mod defaults {
    pub const CAPTURE_SPEED_MS: u64 = 1000;
    pub const START_DELAY_SECS: u64 = 3;
    pub const FILE_NAME: &str = "output";
    pub const STAGING_DIR_NAME: &str = "temp_images";
    pub const ADVANCE_KEY: &str = "right";
    pub const LOG_LEVEL: &str = "info";
}

// Bounds applied to the user-tunable wait before each capture
pub mod limits {
    pub const MIN_CAPTURE_SPEED_MS: u64 = 500;
    pub const MAX_CAPTURE_SPEED_MS: u64 = 5000;
}

// Staged page image naming
pub mod staging {
    pub const PAGE_PREFIX: &str = "img_";
    pub const PAGE_EXTENSION: &str = "png";
    pub const MIN_SEQUENCE_WIDTH: usize = 4;
}

// Driver timing constants
pub mod timing {
    pub const MOUSE_POSITION_POLL_MS: u64 = 100;
    pub const KEYBOARD_POLL_MS: u64 = 200;
}

pub mod pdf {
    pub const PRODUCER: &str = "pagecapture";
}
