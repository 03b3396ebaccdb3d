use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub connectivity: ConnectivityConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connectivity: ConnectivityConfig::default(),
            generator: GeneratorConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

/// How a cluster's net name is chosen when its members disagree. The default
/// follows net-class precedence conventions: the name with more member items
/// wins, ties broken lexicographically. This is a policy choice, not a hard
/// rule, hence configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreakPolicy {
    MembersThenName,
    NameOnly,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectivityConfig {
    #[serde(default = "default_tie_break")]
    pub tie_break: TieBreakPolicy,
    #[serde(default = "default_parallel_scan_threshold")]
    pub parallel_scan_threshold: usize,
    #[serde(default = "default_progress_poll_interval")]
    pub progress_poll_interval: usize,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            tie_break: default_tie_break(),
            parallel_scan_threshold: default_parallel_scan_threshold(),
            progress_poll_interval: default_progress_poll_interval(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_nets")]
    pub nets: usize,
    #[serde(default = "default_pads_per_net")]
    pub pads_per_net: usize,
    #[serde(default = "default_board_size")]
    pub board_size: f64,
    #[serde(default = "default_copper_layers")]
    pub copper_layers: usize,
    #[serde(default = "default_routed_fraction")]
    pub routed_fraction: f64,
    #[serde(default = "default_through_hole_fraction")]
    pub through_hole_fraction: f64,
    #[serde(default = "default_zone_nets")]
    pub zone_nets: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            nets: default_nets(),
            pads_per_net: default_pads_per_net(),
            board_size: default_board_size(),
            copper_layers: default_copper_layers(),
            routed_fraction: default_routed_fraction(),
            through_hole_fraction: default_through_hole_fraction(),
            zone_nets: default_zone_nets(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_png_file")]
    pub png_file: String,
    #[serde(default = "default_png_size")]
    pub png_size: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            png_file: default_png_file(),
            png_size: default_png_size(),
        }
    }
}

fn default_tie_break() -> TieBreakPolicy {
    TieBreakPolicy::MembersThenName
}

fn default_parallel_scan_threshold() -> usize {
    512
}

fn default_progress_poll_interval() -> usize {
    64
}

fn default_seed() -> u64 {
    42
}

fn default_nets() -> usize {
    40
}

fn default_pads_per_net() -> usize {
    6
}

fn default_board_size() -> f64 {
    100.0
}

fn default_copper_layers() -> usize {
    4
}

fn default_routed_fraction() -> f64 {
    0.7
}

fn default_through_hole_fraction() -> f64 {
    0.3
}

fn default_zone_nets() -> usize {
    2
}

fn default_png_file() -> String {
    "output/board.png".to_string()
}

fn default_png_size() -> u32 {
    2000
}
