pub mod mix;

pub use mix::{
    AudioMixer, amplitude_to_db, apply_fades, apply_gain, db_to_amplitude, loop_to_duration,
    normalize, pad_to_duration, write_mix_to_f32le_file,
};
