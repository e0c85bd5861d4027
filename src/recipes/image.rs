// Image recipes
//
// Images, views, layout transitions and transfers between images and
// buffers.

use anyhow::{Context, Result};
use ash::vk;

use super::buffer::{create_buffer_with_data, submit_and_wait};
use super::command::{begin_command_buffer_recording, end_command_buffer_recording};
use super::memory::{allocate_and_bind_memory_object_to_image, free_memory_object};

/// Parameters for [`create_image`]
#[derive(Debug, Clone, Copy)]
pub struct ImageParameters {
    pub image_type: vk::ImageType,
    pub format: vk::Format,
    pub extent: vk::Extent3D,
    pub mip_levels: u32,
    pub array_layers: u32,
    pub samples: vk::SampleCountFlags,
    pub usage: vk::ImageUsageFlags,
    /// Allow cube views; requires a 2D image with a multiple of 6 layers
    pub cubemap: bool,
}

impl ImageParameters {
    pub fn new_2d(format: vk::Format, extent: vk::Extent2D, usage: vk::ImageUsageFlags) -> Self {
        Self {
            image_type: vk::ImageType::TYPE_2D,
            format,
            extent: vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            },
            mip_levels: 1,
            array_layers: 1,
            samples: vk::SampleCountFlags::TYPE_1,
            usage,
            cubemap: false,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.extent.width == 0 || self.extent.height == 0 || self.extent.depth == 0 {
            anyhow::bail!("Image extent must be non-zero");
        }
        if self.mip_levels == 0 || self.array_layers == 0 {
            anyhow::bail!("Image needs at least one mip level and one layer");
        }
        if self.cubemap && (self.image_type != vk::ImageType::TYPE_2D || self.array_layers % 6 != 0) {
            anyhow::bail!("Cubemap images must be 2D with a multiple of 6 layers");
        }
        Ok(())
    }
}

pub fn create_image(device: &ash::Device, params: &ImageParameters) -> Result<vk::Image> {
    params.validate()?;

    let flags = if params.cubemap {
        vk::ImageCreateFlags::CUBE_COMPATIBLE
    } else {
        vk::ImageCreateFlags::empty()
    };

    let image_info = vk::ImageCreateInfo::builder()
        .flags(flags)
        .image_type(params.image_type)
        .format(params.format)
        .extent(params.extent)
        .mip_levels(params.mip_levels)
        .array_layers(params.array_layers)
        .samples(params.samples)
        .tiling(vk::ImageTiling::OPTIMAL)
        .usage(params.usage)
        .sharing_mode(vk::SharingMode::EXCLUSIVE)
        .initial_layout(vk::ImageLayout::UNDEFINED);

    unsafe { device.create_image(&image_info, None) }.context("Could not create an image")
}

/// Layout, access and ownership change for one image
#[derive(Debug, Clone, Copy)]
pub struct ImageTransition {
    pub image: vk::Image,
    pub current_access: vk::AccessFlags,
    pub new_access: vk::AccessFlags,
    pub current_layout: vk::ImageLayout,
    pub new_layout: vk::ImageLayout,
    pub current_queue_family: u32,
    pub new_queue_family: u32,
    pub aspect: vk::ImageAspectFlags,
}

impl ImageTransition {
    pub fn new(
        image: vk::Image,
        current_access: vk::AccessFlags,
        new_access: vk::AccessFlags,
        current_layout: vk::ImageLayout,
        new_layout: vk::ImageLayout,
        aspect: vk::ImageAspectFlags,
    ) -> Self {
        Self {
            image,
            current_access,
            new_access,
            current_layout,
            new_layout,
            current_queue_family: vk::QUEUE_FAMILY_IGNORED,
            new_queue_family: vk::QUEUE_FAMILY_IGNORED,
            aspect,
        }
    }
}

/// Every mip level and layer of the given aspect
pub fn whole_subresource_range(aspect: vk::ImageAspectFlags) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: aspect,
        base_mip_level: 0,
        level_count: vk::REMAINING_MIP_LEVELS,
        base_array_layer: 0,
        layer_count: vk::REMAINING_ARRAY_LAYERS,
    }
}

pub fn image_memory_barriers(transitions: &[ImageTransition]) -> Vec<vk::ImageMemoryBarrier> {
    transitions
        .iter()
        .map(|t| {
            vk::ImageMemoryBarrier::builder()
                .src_access_mask(t.current_access)
                .dst_access_mask(t.new_access)
                .old_layout(t.current_layout)
                .new_layout(t.new_layout)
                .src_queue_family_index(t.current_queue_family)
                .dst_queue_family_index(t.new_queue_family)
                .image(t.image)
                .subresource_range(whole_subresource_range(t.aspect))
                .build()
        })
        .collect()
}

pub fn set_image_memory_barrier(
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    generating_stages: vk::PipelineStageFlags,
    consuming_stages: vk::PipelineStageFlags,
    transitions: &[ImageTransition],
) {
    if transitions.is_empty() {
        return;
    }

    let barriers = image_memory_barriers(transitions);
    unsafe {
        device.cmd_pipeline_barrier(
            command_buffer,
            generating_stages,
            consuming_stages,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &barriers,
        );
    }
}

pub fn create_image_view(
    device: &ash::Device,
    image: vk::Image,
    view_type: vk::ImageViewType,
    format: vk::Format,
    aspect: vk::ImageAspectFlags,
) -> Result<vk::ImageView> {
    let view_info = vk::ImageViewCreateInfo::builder()
        .image(image)
        .view_type(view_type)
        .format(format)
        .components(vk::ComponentMapping {
            r: vk::ComponentSwizzle::IDENTITY,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        })
        .subresource_range(whole_subresource_range(aspect));

    unsafe { device.create_image_view(&view_info, None) }.context("Could not create an image view")
}

/// Image with dedicated memory and a view over all of it
#[derive(Debug, Clone, Copy)]
pub struct ImageWithView {
    pub image: vk::Image,
    pub memory: vk::DeviceMemory,
    pub view: vk::ImageView,
}

impl ImageWithView {
    pub fn destroy(&mut self, device: &ash::Device) {
        destroy_image_view(device, &mut self.view);
        destroy_image(device, &mut self.image);
        free_memory_object(device, &mut self.memory);
    }
}

/// Create an image, back it with device-local memory and create a view.
pub fn create_image_with_view(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: &ash::Device,
    params: &ImageParameters,
    view_type: vk::ImageViewType,
    aspect: vk::ImageAspectFlags,
) -> Result<ImageWithView> {
    let mut result = ImageWithView {
        image: create_image(device, params)?,
        memory: vk::DeviceMemory::null(),
        view: vk::ImageView::null(),
    };

    match allocate_and_bind_memory_object_to_image(
        instance,
        physical_device,
        device,
        result.image,
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
    )
    .and_then(|memory| {
        result.memory = memory;
        create_image_view(device, result.image, view_type, params.format, aspect)
    }) {
        Ok(view) => {
            result.view = view;
            Ok(result)
        }
        Err(e) => {
            result.destroy(device);
            Err(e)
        }
    }
}

#[allow(clippy::too_many_arguments)]
pub fn create_2d_image_and_view(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: &ash::Device,
    format: vk::Format,
    size: vk::Extent2D,
    mip_levels: u32,
    layers: u32,
    samples: vk::SampleCountFlags,
    usage: vk::ImageUsageFlags,
    aspect: vk::ImageAspectFlags,
) -> Result<ImageWithView> {
    let params = ImageParameters {
        mip_levels,
        array_layers: layers,
        samples,
        ..ImageParameters::new_2d(format, size, usage)
    };
    let view_type = if layers > 1 {
        vk::ImageViewType::TYPE_2D_ARRAY
    } else {
        vk::ImageViewType::TYPE_2D
    };

    create_image_with_view(instance, physical_device, device, &params, view_type, aspect)
}

/// Six-layer, cube-compatible 2D image with a CUBE view
#[allow(clippy::too_many_arguments)]
pub fn create_layered_2d_image_with_cubemap_view(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: &ash::Device,
    format: vk::Format,
    size: u32,
    mip_levels: u32,
    usage: vk::ImageUsageFlags,
    aspect: vk::ImageAspectFlags,
) -> Result<ImageWithView> {
    let params = ImageParameters {
        mip_levels,
        array_layers: 6,
        cubemap: true,
        ..ImageParameters::new_2d(format, vk::Extent2D { width: size, height: size }, usage)
    };

    create_image_with_view(instance, physical_device, device, &params, vk::ImageViewType::CUBE, aspect)
}

/// Depth buffer image, memory, and view
pub fn create_depth_buffer(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: &ash::Device,
    format: vk::Format,
    extent: vk::Extent2D,
) -> Result<ImageWithView> {
    create_2d_image_and_view(
        instance,
        physical_device,
        device,
        format,
        extent,
        1,
        1,
        vk::SampleCountFlags::TYPE_1,
        vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
        vk::ImageAspectFlags::DEPTH,
    )
}

pub fn copy_data_from_buffer_to_image(
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    source: vk::Buffer,
    destination: vk::Image,
    layout: vk::ImageLayout,
    regions: &[vk::BufferImageCopy],
) {
    if regions.is_empty() {
        return;
    }
    unsafe { device.cmd_copy_buffer_to_image(command_buffer, source, destination, layout, regions) };
}

pub fn copy_data_from_image_to_buffer(
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    source: vk::Image,
    layout: vk::ImageLayout,
    destination: vk::Buffer,
    regions: &[vk::BufferImageCopy],
) {
    if regions.is_empty() {
        return;
    }
    unsafe { device.cmd_copy_image_to_buffer(command_buffer, source, layout, destination, regions) };
}

/// Where inside an image a staged upload lands, and what happens around it
#[derive(Debug, Clone, Copy)]
pub struct ImageUpdate {
    pub image: vk::Image,
    pub subresource: vk::ImageSubresourceLayers,
    pub offset: vk::Offset3D,
    pub extent: vk::Extent3D,
    pub current_layout: vk::ImageLayout,
    pub new_layout: vk::ImageLayout,
    pub current_access: vk::AccessFlags,
    pub new_access: vk::AccessFlags,
    pub generating_stages: vk::PipelineStageFlags,
    pub consuming_stages: vk::PipelineStageFlags,
}

/// Upload `data` into a device-local image through a staging buffer and
/// transition it to `update.new_layout`. Blocks until finished.
#[allow(clippy::too_many_arguments)]
pub fn use_staging_buffer_to_update_image_with_device_local_memory_bound(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: &ash::Device,
    data: &[u8],
    update: &ImageUpdate,
    queue: vk::Queue,
    command_buffer: vk::CommandBuffer,
    signal_semaphores: &[vk::Semaphore],
) -> Result<()> {
    let mut staging = create_buffer_with_data(instance, physical_device, device, vk::BufferUsageFlags::TRANSFER_SRC, data)?;
    let aspect = update.subresource.aspect_mask;

    let result = (|| {
        begin_command_buffer_recording(device, command_buffer, vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT, None)?;

        set_image_memory_barrier(
            device,
            command_buffer,
            update.generating_stages,
            vk::PipelineStageFlags::TRANSFER,
            &[ImageTransition::new(
                update.image,
                update.current_access,
                vk::AccessFlags::TRANSFER_WRITE,
                update.current_layout,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                aspect,
            )],
        );

        copy_data_from_buffer_to_image(
            device,
            command_buffer,
            staging.buffer,
            update.image,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            &[vk::BufferImageCopy {
                buffer_offset: 0,
                buffer_row_length: 0,
                buffer_image_height: 0,
                image_subresource: update.subresource,
                image_offset: update.offset,
                image_extent: update.extent,
            }],
        );

        set_image_memory_barrier(
            device,
            command_buffer,
            vk::PipelineStageFlags::TRANSFER,
            update.consuming_stages,
            &[ImageTransition::new(
                update.image,
                vk::AccessFlags::TRANSFER_WRITE,
                update.new_access,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                update.new_layout,
                aspect,
            )],
        );

        end_command_buffer_recording(device, command_buffer)?;

        submit_and_wait(device, queue, command_buffer, signal_semaphores)
    })();

    staging.destroy(device);
    result
}

pub fn destroy_image_view(device: &ash::Device, view: &mut vk::ImageView) {
    if *view != vk::ImageView::null() {
        unsafe { device.destroy_image_view(*view, None) };
        *view = vk::ImageView::null();
    }
}

pub fn destroy_image(device: &ash::Device, image: &mut vk::Image) {
    if *image != vk::Image::null() {
        unsafe { device.destroy_image(*image, None) };
        *image = vk::Image::null();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_2d_is_single_level_single_layer() {
        let params = ImageParameters::new_2d(
            vk::Format::R8G8B8A8_UNORM,
            vk::Extent2D { width: 64, height: 32 },
            vk::ImageUsageFlags::SAMPLED,
        );

        assert_eq!(params.extent.depth, 1);
        assert_eq!((params.mip_levels, params.array_layers), (1, 1));
        assert!(params.validate().is_ok());
    }

    #[test]
    fn cubemap_needs_six_layers() {
        let base = ImageParameters::new_2d(
            vk::Format::R8G8B8A8_UNORM,
            vk::Extent2D { width: 64, height: 64 },
            vk::ImageUsageFlags::SAMPLED,
        );

        let four = ImageParameters { array_layers: 4, cubemap: true, ..base };
        assert!(four.validate().is_err());

        let twelve = ImageParameters { array_layers: 12, cubemap: true, ..base };
        assert!(twelve.validate().is_ok());
    }

    #[test]
    fn zero_extent_is_rejected() {
        let params = ImageParameters::new_2d(
            vk::Format::D32_SFLOAT,
            vk::Extent2D { width: 0, height: 32 },
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
        );
        assert!(params.validate().is_err());
    }

    #[test]
    fn barrier_covers_all_levels_and_layers() {
        let barriers = image_memory_barriers(&[ImageTransition::new(
            vk::Image::null(),
            vk::AccessFlags::empty(),
            vk::AccessFlags::TRANSFER_WRITE,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageAspectFlags::COLOR,
        )]);

        let range = barriers[0].subresource_range;
        assert_eq!(range.level_count, vk::REMAINING_MIP_LEVELS);
        assert_eq!(range.layer_count, vk::REMAINING_ARRAY_LAYERS);
        assert_eq!(barriers[0].old_layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(barriers[0].new_layout, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
    }
}
