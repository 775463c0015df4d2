// Adapters layer: concrete implementations of the domain ports (storage, Custom Vision, ffmpeg).

pub mod custom_vision;
pub mod ffmpeg;
pub mod storage;
