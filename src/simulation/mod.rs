pub mod states;
pub mod params;
pub mod adaptability;
pub mod forces;
pub mod system;
pub mod scenario;
