mod utils;

pub use utils::to_packed_rgb;
pub use utils::RGB_CHANNELS;
