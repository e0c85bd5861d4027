// Vulkan recipes
//
// Each module groups the wrappers for one area of the API. Recipes take ash
// loaders and raw handles, return owned handles, and keep no state between
// calls. Every handle is released with the matching `destroy_*` recipe.

pub mod buffer;
pub mod command;
pub mod descriptor;
pub mod device;
pub mod drawing;
pub mod frame;
pub mod image;
pub mod instance;
pub mod memory;
pub mod pipeline;
pub mod render_pass;
pub mod shader;
pub mod surface;
pub mod swapchain;
pub mod sync;
