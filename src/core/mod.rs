pub mod bandpass;
pub mod montage;
pub mod phase;
pub mod ring;
pub mod spectral;
pub mod trigger;
