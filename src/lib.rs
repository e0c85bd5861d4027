// =============================================================================
// VULKAN COOKBOOK - Small, self-contained Vulkan recipes
// =============================================================================
//
// Every recipe is a plain function over ash loaders and raw handles:
//
//   recipes::instance   -> loader, instance, validation messenger
//   recipes::surface    -> presentation surface for a native window
//   recipes::device     -> physical device choice, logical device, queues
//   recipes::swapchain  -> swapchain parameters, acquire, present
//   recipes::command    -> pools and command buffers
//   recipes::sync       -> fences, semaphores, submission
//   recipes::memory     -> memory types, binding, mapping
//   recipes::buffer     -> buffers, views, staging uploads
//   recipes::image      -> images, views, layout transitions
//   recipes::descriptor -> samplers, descriptor layouts, pools and sets
//   recipes::render_pass, pipeline, shader, drawing, frame
//
// `helpers` holds the pieces that never touch the GPU (matrices, textures,
// OBJ meshes) and `context` composes the first few recipes into the objects
// every windowed program needs.
//
// =============================================================================

pub mod context;
pub mod helpers;
pub mod recipes;
