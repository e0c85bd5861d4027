// Swapchain recipes - Window presentation
//
// Selection helpers are pure functions over the surface's reported
// capabilities so they can be reasoned about (and tested) without a GPU.

use anyhow::{Context, Result};
use ash::extensions::khr;
use ash::prelude::VkResult;
use ash::vk;

/// Special `current_extent` value meaning "the swapchain decides the size"
pub const UNDEFINED_EXTENT: u32 = 0xFFFF_FFFF;

pub fn surface_capabilities(
    surface_loader: &khr::Surface,
    physical_device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
) -> Result<vk::SurfaceCapabilitiesKHR> {
    unsafe { surface_loader.get_physical_device_surface_capabilities(physical_device, surface) }
        .context("Could not get the capabilities of a presentation surface")
}

pub fn surface_formats(
    surface_loader: &khr::Surface,
    physical_device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
) -> Result<Vec<vk::SurfaceFormatKHR>> {
    let formats = unsafe { surface_loader.get_physical_device_surface_formats(physical_device, surface) }
        .context("Could not enumerate supported surface formats")?;

    if formats.is_empty() {
        anyhow::bail!("Surface reports no supported formats");
    }

    Ok(formats)
}

pub fn surface_present_modes(
    surface_loader: &khr::Surface,
    physical_device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
) -> Result<Vec<vk::PresentModeKHR>> {
    let modes = unsafe { surface_loader.get_physical_device_surface_present_modes(physical_device, surface) }
        .context("Could not enumerate present modes")?;

    if modes.is_empty() {
        anyhow::bail!("Surface reports no present modes");
    }

    Ok(modes)
}

/// Pick `desired` if supported, otherwise MAILBOX, otherwise FIFO (always available)
pub fn select_desired_present_mode(
    available: &[vk::PresentModeKHR],
    desired: vk::PresentModeKHR,
) -> vk::PresentModeKHR {
    if available.contains(&desired) {
        return desired;
    }

    log::warn!("Desired present mode {:?} is not supported", desired);

    if available.contains(&vk::PresentModeKHR::MAILBOX) {
        log::info!("Selecting MAILBOX present mode instead");
        vk::PresentModeKHR::MAILBOX
    } else {
        log::info!("Selecting FIFO present mode instead");
        vk::PresentModeKHR::FIFO
    }
}

/// One more than the minimum (or `desired` when larger), clamped to the maximum.
/// A maximum of 0 means "no limit".
pub fn select_number_of_images(caps: &vk::SurfaceCapabilitiesKHR, desired: Option<u32>) -> u32 {
    let mut count = (caps.min_image_count + 1).max(desired.unwrap_or(0));
    if caps.max_image_count > 0 && count > caps.max_image_count {
        count = caps.max_image_count;
    }
    count
}

pub fn select_size_of_images(caps: &vk::SurfaceCapabilitiesKHR, requested: vk::Extent2D) -> vk::Extent2D {
    if caps.current_extent.width != UNDEFINED_EXTENT {
        return caps.current_extent;
    }

    vk::Extent2D {
        width: requested
            .width
            .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
        height: requested
            .height
            .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
    }
}

pub fn select_desired_usage(
    caps: &vk::SurfaceCapabilitiesKHR,
    desired: vk::ImageUsageFlags,
) -> Result<vk::ImageUsageFlags> {
    if !caps.supported_usage_flags.contains(desired) {
        let missing = desired & !caps.supported_usage_flags;
        log::error!("Swapchain images do not support usage {:?}", missing);
        anyhow::bail!("Unsupported swapchain image usage: {:?}", missing);
    }
    Ok(desired)
}

pub fn select_transformation(
    caps: &vk::SurfaceCapabilitiesKHR,
    desired: vk::SurfaceTransformFlagsKHR,
) -> vk::SurfaceTransformFlagsKHR {
    if caps.supported_transforms.contains(desired) {
        desired
    } else {
        caps.current_transform
    }
}

/// Pick the closest available surface format to `desired`.
///
/// A single UNDEFINED entry means the surface accepts any format. After an
/// exact match, a matching format with a different color space is preferred,
/// then whatever the surface lists first.
pub fn select_format(
    available: &[vk::SurfaceFormatKHR],
    desired: vk::SurfaceFormatKHR,
) -> Result<vk::SurfaceFormatKHR> {
    let first = available.first().context("No surface formats to choose from")?;

    if available.len() == 1 && first.format == vk::Format::UNDEFINED {
        return Ok(desired);
    }

    if available
        .iter()
        .any(|f| f.format == desired.format && f.color_space == desired.color_space)
    {
        return Ok(desired);
    }

    if let Some(same_format) = available.iter().find(|f| f.format == desired.format) {
        log::info!(
            "Desired combination of format and colorspace is not supported. Selecting {:?} with {:?}",
            same_format.format,
            same_format.color_space
        );
        return Ok(*same_format);
    }

    log::info!(
        "Desired format is not supported. Selecting available format {:?} / {:?}",
        first.format,
        first.color_space
    );
    Ok(*first)
}

/// Everything needed to fill a swapchain create info
#[derive(Debug, Clone, Copy)]
pub struct SwapchainParameters {
    pub surface: vk::SurfaceKHR,
    pub image_count: u32,
    pub format: vk::SurfaceFormatKHR,
    pub extent: vk::Extent2D,
    pub usage: vk::ImageUsageFlags,
    pub transform: vk::SurfaceTransformFlagsKHR,
    pub present_mode: vk::PresentModeKHR,
}

/// Create a swapchain. A non-null `old_swapchain` is retired and destroyed
/// once the new one exists.
pub fn create_swapchain(
    swapchain_loader: &khr::Swapchain,
    params: &SwapchainParameters,
    old_swapchain: &mut vk::SwapchainKHR,
) -> Result<vk::SwapchainKHR> {
    let create_info = vk::SwapchainCreateInfoKHR::builder()
        .surface(params.surface)
        .min_image_count(params.image_count)
        .image_format(params.format.format)
        .image_color_space(params.format.color_space)
        .image_extent(params.extent)
        .image_array_layers(1)
        .image_usage(params.usage)
        .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        .pre_transform(params.transform)
        .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
        .present_mode(params.present_mode)
        .clipped(true)
        .old_swapchain(*old_swapchain);

    let swapchain = unsafe { swapchain_loader.create_swapchain(&create_info, None) }
        .context("Could not create a swapchain")?;

    destroy_swapchain(swapchain_loader, old_swapchain);

    log::info!(
        "Created swapchain: {}x{}, {} images, {:?}",
        params.extent.width,
        params.extent.height,
        params.image_count,
        params.present_mode
    );

    Ok(swapchain)
}

pub fn swapchain_images(
    swapchain_loader: &khr::Swapchain,
    swapchain: vk::SwapchainKHR,
) -> Result<Vec<vk::Image>> {
    let images = unsafe { swapchain_loader.get_swapchain_images(swapchain) }
        .context("Could not enumerate swapchain images")?;

    if images.is_empty() {
        anyhow::bail!("Swapchain has no images");
    }

    Ok(images)
}

/// A freshly created swapchain with the parameters it ended up using
pub struct SwapchainSetup {
    pub swapchain: vk::SwapchainKHR,
    pub format: vk::SurfaceFormatKHR,
    pub extent: vk::Extent2D,
    pub images: Vec<vk::Image>,
}

/// Query the surface and create a swapchain with the given preferences.
#[allow(clippy::too_many_arguments)]
pub fn create_swapchain_for_surface(
    surface_loader: &khr::Surface,
    swapchain_loader: &khr::Swapchain,
    physical_device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    requested_extent: vk::Extent2D,
    desired_format: vk::SurfaceFormatKHR,
    desired_present_mode: vk::PresentModeKHR,
    desired_image_count: Option<u32>,
    usage: vk::ImageUsageFlags,
    old_swapchain: &mut vk::SwapchainKHR,
) -> Result<SwapchainSetup> {
    let present_modes = surface_present_modes(surface_loader, physical_device, surface)?;
    let present_mode = select_desired_present_mode(&present_modes, desired_present_mode);

    let caps = surface_capabilities(surface_loader, physical_device, surface)?;
    let image_count = select_number_of_images(&caps, desired_image_count);
    let extent = select_size_of_images(&caps, requested_extent);
    if extent.width == 0 || extent.height == 0 {
        anyhow::bail!("Surface has zero size; skip swapchain creation until it is visible");
    }

    let usage = select_desired_usage(&caps, usage)?;
    let transform = select_transformation(&caps, vk::SurfaceTransformFlagsKHR::IDENTITY);

    let formats = surface_formats(surface_loader, physical_device, surface)?;
    let format = select_format(&formats, desired_format)?;

    let params = SwapchainParameters {
        surface,
        image_count,
        format,
        extent,
        usage,
        transform,
        present_mode,
    };

    // The old swapchain is gone by now, so a failure here must not leak the new one
    let mut swapchain = create_swapchain(swapchain_loader, &params, old_swapchain)?;
    let images = release_on_error(swapchain_images(swapchain_loader, swapchain), || {
        destroy_swapchain(swapchain_loader, &mut swapchain)
    })?;

    Ok(SwapchainSetup { swapchain, format, extent, images })
}

fn release_on_error<T>(result: Result<T>, release: impl FnOnce()) -> Result<T> {
    if result.is_err() {
        release();
    }
    result
}

pub fn create_swapchain_with_r8g8b8a8_format_and_mailbox_present_mode(
    surface_loader: &khr::Surface,
    swapchain_loader: &khr::Swapchain,
    physical_device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    requested_extent: vk::Extent2D,
    usage: vk::ImageUsageFlags,
    old_swapchain: &mut vk::SwapchainKHR,
) -> Result<SwapchainSetup> {
    create_swapchain_for_surface(
        surface_loader,
        swapchain_loader,
        physical_device,
        surface,
        requested_extent,
        vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        },
        vk::PresentModeKHR::MAILBOX,
        None,
        usage,
        old_swapchain,
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquiredImage {
    pub index: u32,
    /// The swapchain still works but should be recreated soon
    pub suboptimal: bool,
}

/// Acquire the next image. `Ok(None)` means the swapchain is out of date and
/// must be recreated before rendering.
pub fn acquire_swapchain_image(
    swapchain_loader: &khr::Swapchain,
    swapchain: vk::SwapchainKHR,
    semaphore: vk::Semaphore,
    fence: vk::Fence,
    timeout: u64,
) -> Result<Option<AcquiredImage>> {
    acquire_outcome(unsafe { swapchain_loader.acquire_next_image(swapchain, timeout, semaphore, fence) })
}

fn acquire_outcome(result: VkResult<(u32, bool)>) -> Result<Option<AcquiredImage>> {
    match result {
        Ok((index, suboptimal)) => Ok(Some(AcquiredImage { index, suboptimal })),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(None),
        Err(e) => Err(e).context("Could not acquire swapchain image"),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PresentInfo {
    pub swapchain: vk::SwapchainKHR,
    pub image_index: u32,
}

/// Present images. Returns `true` when the swapchain should be recreated.
pub fn present_image(
    swapchain_loader: &khr::Swapchain,
    queue: vk::Queue,
    wait_semaphores: &[vk::Semaphore],
    images: &[PresentInfo],
) -> Result<bool> {
    if images.is_empty() {
        anyhow::bail!("Nothing to present");
    }

    let swapchains: Vec<_> = images.iter().map(|info| info.swapchain).collect();
    let indices: Vec<_> = images.iter().map(|info| info.image_index).collect();

    let present_info = vk::PresentInfoKHR::builder()
        .wait_semaphores(wait_semaphores)
        .swapchains(&swapchains)
        .image_indices(&indices);

    present_outcome(unsafe { swapchain_loader.queue_present(queue, &present_info) })
}

/// `Ok(true)` for SUBOPTIMAL and OUT_OF_DATE: both ask for a new swapchain
fn present_outcome(result: VkResult<bool>) -> Result<bool> {
    match result {
        Ok(suboptimal) => Ok(suboptimal),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(true),
        Err(e) => Err(e).context("Could not present image"),
    }
}

pub fn destroy_swapchain(swapchain_loader: &khr::Swapchain, swapchain: &mut vk::SwapchainKHR) {
    if *swapchain != vk::SwapchainKHR::null() {
        unsafe { swapchain_loader.destroy_swapchain(*swapchain, None) };
        *swapchain = vk::SwapchainKHR::null();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps() -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 3,
            current_extent: vk::Extent2D { width: UNDEFINED_EXTENT, height: UNDEFINED_EXTENT },
            min_image_extent: vk::Extent2D { width: 16, height: 16 },
            max_image_extent: vk::Extent2D { width: 1920, height: 1080 },
            supported_transforms: vk::SurfaceTransformFlagsKHR::IDENTITY,
            current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
            supported_usage_flags: vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST,
            ..Default::default()
        }
    }

    #[test]
    fn present_mode_falls_back_to_mailbox_then_fifo() {
        use vk::PresentModeKHR as M;

        assert_eq!(select_desired_present_mode(&[M::FIFO, M::IMMEDIATE], M::IMMEDIATE), M::IMMEDIATE);
        assert_eq!(select_desired_present_mode(&[M::FIFO, M::MAILBOX], M::IMMEDIATE), M::MAILBOX);
        assert_eq!(select_desired_present_mode(&[M::FIFO], M::FIFO_RELAXED), M::FIFO);
    }

    #[test]
    fn image_count_is_min_plus_one_clamped_to_max() {
        let mut c = caps();
        assert_eq!(select_number_of_images(&c, None), 3);
        assert_eq!(select_number_of_images(&c, Some(8)), 3);

        c.max_image_count = 0;
        assert_eq!(select_number_of_images(&c, Some(8)), 8);
        assert_eq!(select_number_of_images(&c, Some(1)), 3);
    }

    #[test]
    fn size_uses_current_extent_when_defined() {
        let mut c = caps();
        c.current_extent = vk::Extent2D { width: 800, height: 600 };

        let size = select_size_of_images(&c, vk::Extent2D { width: 1, height: 99999 });
        assert_eq!((size.width, size.height), (800, 600));
    }

    #[test]
    fn size_is_clamped_when_undefined() {
        let size = select_size_of_images(&caps(), vk::Extent2D { width: 4, height: 4000 });
        assert_eq!((size.width, size.height), (16, 1080));
    }

    #[test]
    fn usage_must_be_fully_supported() {
        let c = caps();
        assert!(select_desired_usage(&c, vk::ImageUsageFlags::COLOR_ATTACHMENT).is_ok());
        assert!(select_desired_usage(&c, vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::STORAGE).is_err());
    }

    #[test]
    fn unsupported_transform_falls_back_to_current() {
        let c = caps();
        assert_eq!(
            select_transformation(&c, vk::SurfaceTransformFlagsKHR::ROTATE_90),
            vk::SurfaceTransformFlagsKHR::IDENTITY
        );
    }

    fn fmt(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR { format, color_space }
    }

    fn key(f: vk::SurfaceFormatKHR) -> (vk::Format, vk::ColorSpaceKHR) {
        (f.format, f.color_space)
    }

    #[test]
    fn acquire_out_of_date_means_recreate() {
        let acquired = acquire_outcome(Ok((2, false))).unwrap();
        assert_eq!(acquired, Some(AcquiredImage { index: 2, suboptimal: false }));

        let acquired = acquire_outcome(Ok((0, true))).unwrap();
        assert!(acquired.unwrap().suboptimal);

        assert_eq!(acquire_outcome(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)).unwrap(), None);
        assert!(acquire_outcome(Err(vk::Result::ERROR_DEVICE_LOST)).is_err());
        assert!(acquire_outcome(Err(vk::Result::TIMEOUT)).is_err());
    }

    #[test]
    fn present_reports_recreation() {
        assert!(!present_outcome(Ok(false)).unwrap());
        assert!(present_outcome(Ok(true)).unwrap());
        assert!(present_outcome(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)).unwrap());
        assert!(present_outcome(Err(vk::Result::ERROR_DEVICE_LOST)).is_err());
        assert!(present_outcome(Err(vk::Result::ERROR_SURFACE_LOST_KHR)).is_err());
    }

    #[test]
    fn new_swapchain_released_only_on_failure() {
        let mut released = false;
        let images = release_on_error(Ok(vec![1, 2, 3]), || released = true).unwrap();
        assert_eq!(images.len(), 3);
        assert!(!released);

        let mut released = false;
        let images: Result<Vec<u32>> = release_on_error(Err(anyhow::anyhow!("lost")), || released = true);
        assert!(images.is_err());
        assert!(released);
    }

    #[test]
    fn format_selection_order() {
        let srgb = vk::ColorSpaceKHR::SRGB_NONLINEAR;
        let hdr = vk::ColorSpaceKHR::HDR10_ST2084_EXT;
        let desired = fmt(vk::Format::R8G8B8A8_UNORM, srgb);

        // Anything goes
        let any = [fmt(vk::Format::UNDEFINED, srgb)];
        assert_eq!(key(select_format(&any, desired).unwrap()), key(desired));

        // Exact match
        let list = [fmt(vk::Format::B8G8R8A8_UNORM, srgb), desired];
        assert_eq!(key(select_format(&list, desired).unwrap()), key(desired));

        // Same format, different color space
        let list = [fmt(vk::Format::B8G8R8A8_UNORM, srgb), fmt(vk::Format::R8G8B8A8_UNORM, hdr)];
        assert_eq!(key(select_format(&list, desired).unwrap()), (vk::Format::R8G8B8A8_UNORM, hdr));

        // First available
        let list = [fmt(vk::Format::B8G8R8A8_SRGB, srgb), fmt(vk::Format::A2B10G10R10_UNORM_PACK32, hdr)];
        assert_eq!(key(select_format(&list, desired).unwrap()), key(list[0]));

        assert!(select_format(&[], desired).is_err());
    }
}
