use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Args {
    /// Path to config TOML
    #[arg(long, default_value = "entrain.toml")]
    pub config: String,

    /// Session length in seconds
    #[arg(long, default_value_t = 30.0)]
    pub duration: f64,

    /// Frequency of the synthetic source rhythm, Hz
    #[arg(long, default_value_t = 10.0)]
    pub freq: f64,

    /// Noise amplitude added to the synthetic source
    #[arg(long, default_value_t = 0.0)]
    pub noise: f32,

    /// Run without the stimulus output device (would-trigger mode)
    #[arg(long, default_value_t = false)]
    pub no_audio: bool,

    /// Run the synthetic source as fast as possible instead of realtime
    #[arg(long, default_value_t = false)]
    pub unpaced: bool,

    /// Write the rendered stimulus burst to a wav file and continue
    #[arg(long)]
    pub wav: Option<String>,

    /// Export the trigger event log as CSV on exit
    #[arg(long)]
    pub csv: Option<String>,
}
