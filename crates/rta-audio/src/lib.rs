pub mod capture;
pub mod device;
pub mod processor;
pub mod protocol;
pub mod ring_buffer;
pub mod sample_ring;

// Public API
pub use capture::{CaptureThread, DeviceConfig};
pub use device::{list_input_devices, open_input_device, DeviceInfo};
pub use processor::AnalysisProcessor;
pub use protocol::{AnalyzerEvent, ConfigUpdate};
pub use ring_buffer::{AudioConsumer, AudioProducer, AudioRingBuffer};
pub use sample_ring::SampleRing;
