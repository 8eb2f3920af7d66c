#[derive(Debug, Clone, Copy)]
pub struct Tag {
    /// Field name in the state mapping.
    pub key: &'static str,
    pub metric: &'static str,
    pub help: &'static str,
}

pub const SAMPLE_TIME: Tag = Tag {
    key: "sample_time",
    metric: "sousvide_sample_time_seconds",
    help: "Unix time of the last temperature sample",
};

pub const TEMPERATURE: Tag = Tag {
    key: "temperature",
    metric: "sousvide_temperature_fahrenheit",
    help: "Last sampled bath temperature in °F",
};

pub const TARGET: Tag = Tag {
    key: "target",
    metric: "sousvide_target_fahrenheit",
    help: "Target bath temperature in °F",
};

pub const SETTING: Tag = Tag {
    key: "setting",
    metric: "sousvide_heater_setting_ratio",
    help: "Heater power fraction (0.0-1.0)",
};

pub const PROPORTIONAL: Tag = Tag {
    key: "proportional",
    metric: "sousvide_proportional_term",
    help: "Proportional term of the last control step",
};

pub const OFFSET: Tag = Tag {
    key: "offset",
    metric: "sousvide_integral_term",
    help: "Integral term of the last control step",
};

pub const KP: Tag = Tag {
    key: "kp",
    metric: "sousvide_kp",
    help: "Proportional gain",
};

pub const KI: Tag = Tag {
    key: "ki",
    metric: "sousvide_ki",
    help: "Integral gain",
};

/// Fields a client may assign through `set_state`.
pub const TUNABLE: &[Tag] = &[TARGET, PROPORTIONAL, OFFSET, KP, KI];

/// Every field of the state mapping.
pub const STATE: &[Tag] = &[
    SAMPLE_TIME,
    TEMPERATURE,
    TARGET,
    SETTING,
    PROPORTIONAL,
    OFFSET,
    KP,
    KI,
];
