// Vulkan context - The objects every windowed program needs
//
// Built entirely from recipes:
// - Instance with surface extensions (+ validation when requested)
// - Presentation surface for the window
// - Physical device with graphics and presentation support (prefer discrete GPU)
// - Logical device with VK_KHR_swapchain and its queues

use anyhow::{Context, Result};
use ash::extensions::{ext, khr};
use ash::{vk, Entry};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use crate::recipes::device::{
    available_device_extensions, create_logical_device_with_wsi_extensions_enabled, destroy_logical_device,
    device_name, get_device_queue, log_device_extensions, physical_device_features_and_properties,
    pick_physical_device, queue_families, select_queue_family_that_supports_presentation,
    select_queue_family_with_capabilities, QueueInfo,
};
use crate::recipes::instance::{
    create_debug_messenger, create_vulkan_instance_with_wsi_extensions_enabled, destroy_debug_messenger,
    destroy_vulkan_instance, is_extension_supported, load_vulkan_library, VALIDATION_LAYER,
};
use crate::recipes::surface::{create_presentation_surface, destroy_presentation_surface};

/// Instance, surface, device and queues, destroyed in reverse order on drop
pub struct VulkanContext {
    pub swapchain_loader: khr::Swapchain,
    pub device: ash::Device,
    pub graphics_queue: vk::Queue,
    pub graphics_queue_family: u32,
    pub present_queue: vk::Queue,
    pub present_queue_family: u32,
    pub physical_device: vk::PhysicalDevice,
    pub properties: vk::PhysicalDeviceProperties,
    pub surface_loader: khr::Surface,
    pub surface: vk::SurfaceKHR,
    debug_utils: Option<(ext::DebugUtils, vk::DebugUtilsMessengerEXT)>,
    pub instance: ash::Instance,
    pub entry: Entry,
}

/// Graphics and presentation families for one physical device
fn queue_families_for_surface(
    instance: &ash::Instance,
    surface_loader: &khr::Surface,
    physical_device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
) -> Result<Option<(u32, u32)>> {
    let families = queue_families(instance, physical_device)?;
    let Some(graphics) = select_queue_family_with_capabilities(&families, vk::QueueFlags::GRAPHICS) else {
        return Ok(None);
    };

    // Prefer a family that can do both
    let supports_present = unsafe {
        surface_loader.get_physical_device_surface_support(physical_device, graphics, surface)
    }
    .context("Could not query presentation support")?;
    if supports_present {
        return Ok(Some((graphics, graphics)));
    }

    Ok(select_queue_family_that_supports_presentation(instance, surface_loader, physical_device, surface)?
        .map(|present| (graphics, present)))
}

/// Messenger first, then the instance itself
fn destroy_instance_level(
    instance: &ash::Instance,
    debug_utils: Option<(ext::DebugUtils, vk::DebugUtilsMessengerEXT)>,
) {
    if let Some((debug, mut messenger)) = debug_utils {
        destroy_debug_messenger(&debug, &mut messenger);
    }
    destroy_vulkan_instance(instance);
}

/// Distinct queue requests for the graphics and presentation families
fn unique_queue_infos(graphics_family: u32, present_family: u32) -> Vec<QueueInfo> {
    let mut infos = vec![QueueInfo::new(graphics_family, vec![1.0])];
    if present_family != graphics_family {
        infos.push(QueueInfo::new(present_family, vec![1.0]));
    }
    infos
}

impl VulkanContext {
    pub fn new(
        app_name: &str,
        display: RawDisplayHandle,
        window: RawWindowHandle,
        enable_validation: bool,
    ) -> Result<Self> {
        log::info!("Creating Vulkan context: {}", app_name);

        let entry = load_vulkan_library()?;

        let mut extensions = Vec::new();
        let mut layers = Vec::new();
        if enable_validation {
            extensions.push(ext::DebugUtils::name());
            layers.push(VALIDATION_LAYER);
        }
        let instance =
            create_vulkan_instance_with_wsi_extensions_enabled(&entry, display, app_name, &extensions, &layers)?;

        let debug_utils = if enable_validation {
            match create_debug_messenger(&entry, &instance) {
                Ok(debug) => Some(debug),
                Err(e) => {
                    log::warn!("Validation output disabled: {:#}", e);
                    None
                }
            }
        } else {
            None
        };

        let surface_loader = khr::Surface::new(&entry, &instance);
        let mut surface = match create_presentation_surface(&entry, &instance, display, window) {
            Ok(surface) => surface,
            Err(e) => {
                destroy_instance_level(&instance, debug_utils);
                return Err(e);
            }
        };

        // Everything below only needs the surface; undo instance-level state on failure
        let devices = (|| -> Result<_> {
            let physical_device = pick_physical_device(&instance, |pdev| {
                let has_swapchain = available_device_extensions(&instance, pdev)
                    .map(|exts| is_extension_supported(&exts, khr::Swapchain::name()))
                    .unwrap_or(false);
                let has_queues = matches!(
                    queue_families_for_surface(&instance, &surface_loader, pdev, surface),
                    Ok(Some(_))
                );
                has_swapchain && has_queues
            })?;

            let (graphics_queue_family, present_queue_family) =
                queue_families_for_surface(&instance, &surface_loader, physical_device, surface)?
                    .context("Selected GPU lost its queue families")?;

            let (_, properties) = physical_device_features_and_properties(&instance, physical_device);
            log::info!("Selected GPU: {}", device_name(&properties));
            log::info!(
                "API Version: {}.{}.{}",
                vk::api_version_major(properties.api_version),
                vk::api_version_minor(properties.api_version),
                vk::api_version_patch(properties.api_version)
            );
            if log::log_enabled!(log::Level::Debug) {
                log_device_extensions(&available_device_extensions(&instance, physical_device)?);
            }

            let device = create_logical_device_with_wsi_extensions_enabled(
                &instance,
                physical_device,
                &unique_queue_infos(graphics_queue_family, present_queue_family),
                &[],
                None,
            )?;

            Ok((physical_device, properties, device, graphics_queue_family, present_queue_family))
        })();

        let (physical_device, properties, device, graphics_queue_family, present_queue_family) = match devices {
            Ok(devices) => devices,
            Err(e) => {
                destroy_presentation_surface(&surface_loader, &mut surface);
                destroy_instance_level(&instance, debug_utils);
                return Err(e);
            }
        };

        let graphics_queue = get_device_queue(&device, graphics_queue_family, 0);
        let present_queue = get_device_queue(&device, present_queue_family, 0);
        let swapchain_loader = khr::Swapchain::new(&instance, &device);

        Ok(Self {
            swapchain_loader,
            device,
            graphics_queue,
            graphics_queue_family,
            present_queue,
            present_queue_family,
            physical_device,
            properties,
            surface_loader,
            surface,
            debug_utils,
            instance,
            entry,
        })
    }

    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle() }.context("Could not wait for device idle")
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        log::info!("Destroying Vulkan context...");

        destroy_logical_device(&self.device);
        destroy_presentation_surface(&self.surface_loader, &mut self.surface);
        destroy_instance_level(&self.instance, self.debug_utils.take());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_family_requests_one_queue() {
        let infos = unique_queue_infos(0, 0);
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].family_index, 0);
    }

    #[test]
    fn separate_present_family_gets_its_own_queue() {
        let infos = unique_queue_infos(0, 2);
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[1].family_index, 2);
        assert_eq!(infos[1].priorities, vec![1.0]);
    }

    #[test]
    fn mismatched_window_handle_fails_cleanly() {
        use raw_window_handle::{WebWindowHandle, XlibDisplayHandle};

        // Surface creation rejects the pair after the instance exists
        let display = RawDisplayHandle::Xlib(XlibDisplayHandle::new(None, 0));
        let window = RawWindowHandle::Web(WebWindowHandle::new(1));

        assert!(VulkanContext::new("context-test", display, window, false).is_err());
    }
}
