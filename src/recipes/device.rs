// Device recipes - Physical device queries and logical device creation
//
// Responsibilities:
// - Enumerate physical devices and their extensions/features/properties
// - Pick queue families by capability or presentation support
// - Create logical devices and fetch their queues

use anyhow::{Context, Result};
use ash::vk;
use std::ffi::CStr;

use super::instance::{extension_name, missing_extensions};

/// Queues requested from a single queue family
#[derive(Debug, Clone)]
pub struct QueueInfo {
    pub family_index: u32,
    pub priorities: Vec<f32>,
}

impl QueueInfo {
    pub fn new(family_index: u32, priorities: Vec<f32>) -> Self {
        Self { family_index, priorities }
    }
}

pub fn enumerate_physical_devices(instance: &ash::Instance) -> Result<Vec<vk::PhysicalDevice>> {
    let devices = unsafe { instance.enumerate_physical_devices() }
        .context("Could not get the number of available physical devices")?;

    if devices.is_empty() {
        anyhow::bail!("No Vulkan-capable GPU found");
    }

    Ok(devices)
}

pub fn available_device_extensions(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
) -> Result<Vec<vk::ExtensionProperties>> {
    unsafe { instance.enumerate_device_extension_properties(physical_device) }
        .context("Could not enumerate device extensions")
}

pub fn physical_device_features_and_properties(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
) -> (vk::PhysicalDeviceFeatures, vk::PhysicalDeviceProperties) {
    unsafe {
        (
            instance.get_physical_device_features(physical_device),
            instance.get_physical_device_properties(physical_device),
        )
    }
}

pub fn queue_families(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
) -> Result<Vec<vk::QueueFamilyProperties>> {
    let families = unsafe { instance.get_physical_device_queue_family_properties(physical_device) };

    if families.is_empty() {
        anyhow::bail!("Could not acquire properties of queue families");
    }

    Ok(families)
}

/// Index of the first family exposing at least one queue with all of `desired`
pub fn select_queue_family_with_capabilities(
    families: &[vk::QueueFamilyProperties],
    desired: vk::QueueFlags,
) -> Option<u32> {
    families
        .iter()
        .position(|family| family.queue_count > 0 && family.queue_flags.contains(desired))
        .map(|index| index as u32)
}

pub fn select_queue_family_that_supports_presentation(
    instance: &ash::Instance,
    surface_loader: &ash::extensions::khr::Surface,
    physical_device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
) -> Result<Option<u32>> {
    let families = queue_families(instance, physical_device)?;

    for index in 0..families.len() as u32 {
        let supported = unsafe {
            surface_loader.get_physical_device_surface_support(physical_device, index, surface)
        }
        .context("Could not query presentation support")?;

        if supported {
            return Ok(Some(index));
        }
    }

    Ok(None)
}

/// Score a device for automatic selection (prefer discrete GPU)
pub fn score_physical_device(properties: &vk::PhysicalDeviceProperties) -> u32 {
    match properties.device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 1000,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 100,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 10,
        _ => 1,
    }
}

pub fn device_name(properties: &vk::PhysicalDeviceProperties) -> String {
    unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
        .to_string_lossy()
        .into_owned()
}

/// Create a logical device.
///
/// All `desired_extensions` must be supported by the physical device. One
/// queue is created for every priority listed in each [`QueueInfo`].
pub fn create_logical_device(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    queue_infos: &[QueueInfo],
    desired_extensions: &[&CStr],
    desired_features: Option<&vk::PhysicalDeviceFeatures>,
) -> Result<ash::Device> {
    if queue_infos.is_empty() {
        anyhow::bail!("At least one queue family must be requested");
    }

    let available = available_device_extensions(instance, physical_device)?;
    let missing = missing_extensions(&available, desired_extensions);
    if !missing.is_empty() {
        for name in &missing {
            log::error!("Extension named '{}' is not supported by a physical device", name.to_string_lossy());
        }
        anyhow::bail!("{} device extension(s) not supported", missing.len());
    }

    let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = queue_infos
        .iter()
        .map(|info| {
            vk::DeviceQueueCreateInfo::builder()
                .queue_family_index(info.family_index)
                .queue_priorities(&info.priorities)
                .build()
        })
        .collect();

    let extensions: Vec<_> = desired_extensions.iter().map(|name| name.as_ptr()).collect();

    let mut create_info = vk::DeviceCreateInfo::builder()
        .queue_create_infos(&queue_create_infos)
        .enabled_extension_names(&extensions);
    if let Some(features) = desired_features {
        create_info = create_info.enabled_features(features);
    }

    let device = unsafe { instance.create_device(physical_device, &create_info, None) }
        .context("Could not create logical device")?;

    log::debug!(
        "Created logical device with {} queue famil{} and {} extension(s)",
        queue_infos.len(),
        if queue_infos.len() == 1 { "y" } else { "ies" },
        extensions.len()
    );

    Ok(device)
}

/// Same as [`create_logical_device`] with `VK_KHR_swapchain` added.
pub fn create_logical_device_with_wsi_extensions_enabled(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    queue_infos: &[QueueInfo],
    desired_extensions: &[&CStr],
    desired_features: Option<&vk::PhysicalDeviceFeatures>,
) -> Result<ash::Device> {
    let swapchain = ash::extensions::khr::Swapchain::name();
    let mut extensions = desired_extensions.to_vec();
    if !extensions.contains(&swapchain) {
        extensions.push(swapchain);
    }

    create_logical_device(instance, physical_device, queue_infos, &extensions, desired_features)
}

pub fn get_device_queue(device: &ash::Device, family_index: u32, queue_index: u32) -> vk::Queue {
    unsafe { device.get_device_queue(family_index, queue_index) }
}

/// Queue requests for a graphics and a compute family, merged when they are
/// the same family.
pub fn graphics_and_compute_queue_infos(graphics_family: u32, compute_family: u32) -> Vec<QueueInfo> {
    let mut infos = vec![QueueInfo::new(graphics_family, vec![1.0])];
    if compute_family != graphics_family {
        infos.push(QueueInfo::new(compute_family, vec![1.0]));
    }
    infos
}

/// Logical device with graphics and compute queues
pub struct GraphicsComputeDevice {
    pub physical_device: vk::PhysicalDevice,
    pub device: ash::Device,
    pub graphics_queue: vk::Queue,
    pub graphics_family: u32,
    pub compute_queue: vk::Queue,
    pub compute_family: u32,
}

/// Pick the first physical device with geometry shaders, a graphics family
/// and a compute family, and create a logical device on it.
pub fn create_logical_device_with_geometry_shader_graphics_and_compute_queues(
    instance: &ash::Instance,
) -> Result<GraphicsComputeDevice> {
    for physical_device in enumerate_physical_devices(instance)? {
        let (features, properties) = physical_device_features_and_properties(instance, physical_device);

        if features.geometry_shader != vk::TRUE {
            log::debug!("Skipping {}: no geometry shader support", device_name(&properties));
            continue;
        }

        let families = queue_families(instance, physical_device)?;
        let Some(graphics_family) = select_queue_family_with_capabilities(&families, vk::QueueFlags::GRAPHICS) else {
            continue;
        };
        let Some(compute_family) = select_queue_family_with_capabilities(&families, vk::QueueFlags::COMPUTE) else {
            continue;
        };

        let enabled = vk::PhysicalDeviceFeatures {
            geometry_shader: vk::TRUE,
            ..Default::default()
        };

        let queue_infos = graphics_and_compute_queue_infos(graphics_family, compute_family);
        let device = match create_logical_device(instance, physical_device, &queue_infos, &[], Some(&enabled)) {
            Ok(device) => device,
            Err(e) => {
                log::warn!("Could not create device on {}: {:#}", device_name(&properties), e);
                continue;
            }
        };

        log::info!("Selected GPU: {}", device_name(&properties));

        return Ok(GraphicsComputeDevice {
            physical_device,
            graphics_queue: get_device_queue(&device, graphics_family, 0),
            compute_queue: get_device_queue(&device, compute_family, 0),
            device,
            graphics_family,
            compute_family,
        });
    }

    anyhow::bail!("No physical device supports geometry shaders with graphics and compute queues")
}

/// Pick the highest scoring device that passes `is_suitable`
pub fn pick_physical_device(
    instance: &ash::Instance,
    mut is_suitable: impl FnMut(vk::PhysicalDevice) -> bool,
) -> Result<vk::PhysicalDevice> {
    let mut best = None;
    let mut best_score = 0;

    for physical_device in enumerate_physical_devices(instance)? {
        if !is_suitable(physical_device) {
            continue;
        }

        let (_, properties) = physical_device_features_and_properties(instance, physical_device);
        let score = score_physical_device(&properties);
        if score > best_score {
            best_score = score;
            best = Some(physical_device);
        }
    }

    best.ok_or_else(|| anyhow::anyhow!("No suitable GPU found"))
}

/// Log the name of every extension a device supports
pub fn log_device_extensions(extensions: &[vk::ExtensionProperties]) {
    for ext in extensions {
        log::debug!("  {}", extension_name(ext).to_string_lossy());
    }
}

/// Wait for the device to go idle before destroying it.
pub fn destroy_logical_device(device: &ash::Device) {
    unsafe {
        let _ = device.device_wait_idle();
        device.destroy_device(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags, count: u32) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: count,
            ..Default::default()
        }
    }

    #[test]
    fn selects_first_family_with_all_flags() {
        let families = [
            family(vk::QueueFlags::TRANSFER, 2),
            family(vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER, 4),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE, 1),
        ];

        assert_eq!(select_queue_family_with_capabilities(&families, vk::QueueFlags::COMPUTE), Some(1));
        assert_eq!(
            select_queue_family_with_capabilities(&families, vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
            Some(2)
        );
        assert_eq!(select_queue_family_with_capabilities(&families, vk::QueueFlags::SPARSE_BINDING), None);
    }

    #[test]
    fn families_without_queues_are_ignored() {
        let families = [family(vk::QueueFlags::GRAPHICS, 0), family(vk::QueueFlags::GRAPHICS, 1)];
        assert_eq!(select_queue_family_with_capabilities(&families, vk::QueueFlags::GRAPHICS), Some(1));
    }

    #[test]
    fn discrete_gpu_scores_highest() {
        let props = |device_type| vk::PhysicalDeviceProperties { device_type, ..Default::default() };

        let discrete = score_physical_device(&props(vk::PhysicalDeviceType::DISCRETE_GPU));
        let integrated = score_physical_device(&props(vk::PhysicalDeviceType::INTEGRATED_GPU));
        let cpu = score_physical_device(&props(vk::PhysicalDeviceType::CPU));

        assert!(discrete > integrated);
        assert!(integrated > cpu);
        assert!(cpu > 0);
    }

    #[test]
    fn shared_family_gets_one_queue_request() {
        let infos = graphics_and_compute_queue_infos(0, 0);
        assert_eq!(infos.len(), 1);

        let infos = graphics_and_compute_queue_infos(0, 2);
        assert_eq!(infos.iter().map(|i| i.family_index).collect::<Vec<_>>(), vec![0, 2]);
    }
}
