// Descriptor recipes
//
// Samplers, shader-visible resources, descriptor set layouts, pools and
// descriptor set updates.

use anyhow::{Context, Result};
use ash::vk;

use super::buffer::{create_buffer_view, create_buffer_with_memory, destroy_buffer_view, BufferWithMemory};
use super::image::{create_image_with_view, ImageParameters, ImageWithView};

// ---------------------------------------------------------------------------
// Format feature checks
// ---------------------------------------------------------------------------

pub fn supports_sampled_image(props: &vk::FormatProperties, linear_filtering: bool) -> bool {
    let features = props.optimal_tiling_features;
    features.contains(vk::FormatFeatureFlags::SAMPLED_IMAGE)
        && (!linear_filtering || features.contains(vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR))
}

pub fn supports_storage_image(props: &vk::FormatProperties, atomic_operations: bool) -> bool {
    let features = props.optimal_tiling_features;
    features.contains(vk::FormatFeatureFlags::STORAGE_IMAGE)
        && (!atomic_operations || features.contains(vk::FormatFeatureFlags::STORAGE_IMAGE_ATOMIC))
}

pub fn supports_uniform_texel_buffer(props: &vk::FormatProperties) -> bool {
    props
        .buffer_features
        .contains(vk::FormatFeatureFlags::UNIFORM_TEXEL_BUFFER)
}

pub fn supports_storage_texel_buffer(props: &vk::FormatProperties, atomic_operations: bool) -> bool {
    let features = props.buffer_features;
    features.contains(vk::FormatFeatureFlags::STORAGE_TEXEL_BUFFER)
        && (!atomic_operations || features.contains(vk::FormatFeatureFlags::STORAGE_TEXEL_BUFFER_ATOMIC))
}

/// Color aspects need COLOR_ATTACHMENT, depth/stencil aspects need
/// DEPTH_STENCIL_ATTACHMENT.
pub fn supports_input_attachment(props: &vk::FormatProperties, aspect: vk::ImageAspectFlags) -> bool {
    let features = props.optimal_tiling_features;
    if aspect.contains(vk::ImageAspectFlags::COLOR) && !features.contains(vk::FormatFeatureFlags::COLOR_ATTACHMENT) {
        return false;
    }
    if aspect.intersects(vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL)
        && !features.contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
    {
        return false;
    }
    true
}

fn format_properties(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    format: vk::Format,
) -> vk::FormatProperties {
    unsafe { instance.get_physical_device_format_properties(physical_device, format) }
}

fn require_format(supported: bool, format: vk::Format, what: &str) -> Result<()> {
    if !supported {
        log::error!("Provided format {:?} is not supported for {}", format, what);
        anyhow::bail!("Format {:?} does not support {}", format, what);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Samplers and shader resources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct SamplerParameters {
    pub mag_filter: vk::Filter,
    pub min_filter: vk::Filter,
    pub mipmap_mode: vk::SamplerMipmapMode,
    pub address_mode_u: vk::SamplerAddressMode,
    pub address_mode_v: vk::SamplerAddressMode,
    pub address_mode_w: vk::SamplerAddressMode,
    pub mip_lod_bias: f32,
    pub anisotropy_enable: bool,
    pub max_anisotropy: f32,
    pub compare_enable: bool,
    pub compare_op: vk::CompareOp,
    pub min_lod: f32,
    pub max_lod: f32,
    pub border_color: vk::BorderColor,
    pub unnormalized_coordinates: bool,
}

impl Default for SamplerParameters {
    fn default() -> Self {
        Self {
            mag_filter: vk::Filter::LINEAR,
            min_filter: vk::Filter::LINEAR,
            mipmap_mode: vk::SamplerMipmapMode::NEAREST,
            address_mode_u: vk::SamplerAddressMode::CLAMP_TO_EDGE,
            address_mode_v: vk::SamplerAddressMode::CLAMP_TO_EDGE,
            address_mode_w: vk::SamplerAddressMode::CLAMP_TO_EDGE,
            mip_lod_bias: 0.0,
            anisotropy_enable: false,
            max_anisotropy: 1.0,
            compare_enable: false,
            compare_op: vk::CompareOp::ALWAYS,
            min_lod: 0.0,
            max_lod: 1.0,
            border_color: vk::BorderColor::FLOAT_OPAQUE_BLACK,
            unnormalized_coordinates: false,
        }
    }
}

pub fn create_sampler(device: &ash::Device, params: &SamplerParameters) -> Result<vk::Sampler> {
    let sampler_info = vk::SamplerCreateInfo::builder()
        .mag_filter(params.mag_filter)
        .min_filter(params.min_filter)
        .mipmap_mode(params.mipmap_mode)
        .address_mode_u(params.address_mode_u)
        .address_mode_v(params.address_mode_v)
        .address_mode_w(params.address_mode_w)
        .mip_lod_bias(params.mip_lod_bias)
        .anisotropy_enable(params.anisotropy_enable)
        .max_anisotropy(params.max_anisotropy)
        .compare_enable(params.compare_enable)
        .compare_op(params.compare_op)
        .min_lod(params.min_lod)
        .max_lod(params.max_lod)
        .border_color(params.border_color)
        .unnormalized_coordinates(params.unnormalized_coordinates);

    unsafe { device.create_sampler(&sampler_info, None) }.context("Could not create sampler")
}

/// Image with SAMPLED usage after checking the format can be sampled
pub fn create_sampled_image(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: &ash::Device,
    params: &ImageParameters,
    view_type: vk::ImageViewType,
    aspect: vk::ImageAspectFlags,
    linear_filtering: bool,
) -> Result<ImageWithView> {
    let props = format_properties(instance, physical_device, params.format);
    require_format(supports_sampled_image(&props, linear_filtering), params.format, "sampled images")?;

    let params = ImageParameters {
        usage: params.usage | vk::ImageUsageFlags::SAMPLED,
        ..*params
    };
    create_image_with_view(instance, physical_device, device, &params, view_type, aspect)
}

pub struct CombinedImageSampler {
    pub sampler: vk::Sampler,
    pub image: ImageWithView,
}

impl CombinedImageSampler {
    pub fn destroy(&mut self, device: &ash::Device) {
        destroy_sampler(device, &mut self.sampler);
        self.image.destroy(device);
    }
}

#[allow(clippy::too_many_arguments)]
pub fn create_combined_image_sampler(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: &ash::Device,
    params: &ImageParameters,
    view_type: vk::ImageViewType,
    aspect: vk::ImageAspectFlags,
    sampler_params: &SamplerParameters,
) -> Result<CombinedImageSampler> {
    let linear_filtering = sampler_params.mag_filter == vk::Filter::LINEAR
        || sampler_params.min_filter == vk::Filter::LINEAR
        || sampler_params.mipmap_mode == vk::SamplerMipmapMode::LINEAR;

    let mut sampler = create_sampler(device, sampler_params)?;
    match create_sampled_image(instance, physical_device, device, params, view_type, aspect, linear_filtering) {
        Ok(image) => Ok(CombinedImageSampler { sampler, image }),
        Err(e) => {
            destroy_sampler(device, &mut sampler);
            Err(e)
        }
    }
}

pub fn create_storage_image(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: &ash::Device,
    params: &ImageParameters,
    view_type: vk::ImageViewType,
    aspect: vk::ImageAspectFlags,
    atomic_operations: bool,
) -> Result<ImageWithView> {
    let props = format_properties(instance, physical_device, params.format);
    require_format(supports_storage_image(&props, atomic_operations), params.format, "storage images")?;

    let params = ImageParameters {
        usage: params.usage | vk::ImageUsageFlags::STORAGE,
        ..*params
    };
    create_image_with_view(instance, physical_device, device, &params, view_type, aspect)
}

/// Buffer with a texel view over its whole range
pub struct TexelBuffer {
    pub buffer: BufferWithMemory,
    pub view: vk::BufferView,
}

impl TexelBuffer {
    pub fn destroy(&mut self, device: &ash::Device) {
        destroy_buffer_view(device, &mut self.view);
        self.buffer.destroy(device);
    }
}

fn create_texel_buffer(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: &ash::Device,
    format: vk::Format,
    size: vk::DeviceSize,
    usage: vk::BufferUsageFlags,
) -> Result<TexelBuffer> {
    let mut buffer = create_buffer_with_memory(
        instance,
        physical_device,
        device,
        size,
        usage,
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
    )?;

    match create_buffer_view(device, buffer.buffer, format, 0, vk::WHOLE_SIZE) {
        Ok(view) => Ok(TexelBuffer { buffer, view }),
        Err(e) => {
            buffer.destroy(device);
            Err(e)
        }
    }
}

pub fn create_uniform_texel_buffer(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: &ash::Device,
    format: vk::Format,
    size: vk::DeviceSize,
    usage: vk::BufferUsageFlags,
) -> Result<TexelBuffer> {
    let props = format_properties(instance, physical_device, format);
    require_format(supports_uniform_texel_buffer(&props), format, "uniform texel buffers")?;

    create_texel_buffer(
        instance,
        physical_device,
        device,
        format,
        size,
        usage | vk::BufferUsageFlags::UNIFORM_TEXEL_BUFFER,
    )
}

#[allow(clippy::too_many_arguments)]
pub fn create_storage_texel_buffer(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: &ash::Device,
    format: vk::Format,
    size: vk::DeviceSize,
    usage: vk::BufferUsageFlags,
    atomic_operations: bool,
) -> Result<TexelBuffer> {
    let props = format_properties(instance, physical_device, format);
    require_format(
        supports_storage_texel_buffer(&props, atomic_operations),
        format,
        "storage texel buffers",
    )?;

    create_texel_buffer(
        instance,
        physical_device,
        device,
        format,
        size,
        usage | vk::BufferUsageFlags::STORAGE_TEXEL_BUFFER,
    )
}

pub fn create_uniform_buffer(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: &ash::Device,
    size: vk::DeviceSize,
    usage: vk::BufferUsageFlags,
) -> Result<BufferWithMemory> {
    create_buffer_with_memory(
        instance,
        physical_device,
        device,
        size,
        usage | vk::BufferUsageFlags::UNIFORM_BUFFER,
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
    )
}

pub fn create_storage_buffer(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: &ash::Device,
    size: vk::DeviceSize,
    usage: vk::BufferUsageFlags,
) -> Result<BufferWithMemory> {
    create_buffer_with_memory(
        instance,
        physical_device,
        device,
        size,
        usage | vk::BufferUsageFlags::STORAGE_BUFFER,
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
    )
}

pub fn create_input_attachment(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: &ash::Device,
    params: &ImageParameters,
    view_type: vk::ImageViewType,
    aspect: vk::ImageAspectFlags,
) -> Result<ImageWithView> {
    let props = format_properties(instance, physical_device, params.format);
    require_format(supports_input_attachment(&props, aspect), params.format, "input attachments")?;

    let params = ImageParameters {
        usage: params.usage | vk::ImageUsageFlags::INPUT_ATTACHMENT,
        ..*params
    };
    create_image_with_view(instance, physical_device, device, &params, view_type, aspect)
}

// ---------------------------------------------------------------------------
// Layouts, pools and sets
// ---------------------------------------------------------------------------

pub fn create_descriptor_set_layout(
    device: &ash::Device,
    bindings: &[vk::DescriptorSetLayoutBinding],
) -> Result<vk::DescriptorSetLayout> {
    let layout_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(bindings);

    unsafe { device.create_descriptor_set_layout(&layout_info, None) }
        .context("Could not create a layout for descriptor sets")
}

/// `free_individual_sets` adds FREE_DESCRIPTOR_SET so [`free_descriptor_sets`] is allowed
pub fn create_descriptor_pool(
    device: &ash::Device,
    free_individual_sets: bool,
    max_sets: u32,
    descriptor_types: &[vk::DescriptorPoolSize],
) -> Result<vk::DescriptorPool> {
    if max_sets == 0 || descriptor_types.is_empty() {
        anyhow::bail!("Descriptor pool needs at least one set and one descriptor type");
    }

    let flags = if free_individual_sets {
        vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET
    } else {
        vk::DescriptorPoolCreateFlags::empty()
    };

    let pool_info = vk::DescriptorPoolCreateInfo::builder()
        .flags(flags)
        .max_sets(max_sets)
        .pool_sizes(descriptor_types);

    unsafe { device.create_descriptor_pool(&pool_info, None) }.context("Could not create a descriptor pool")
}

pub fn allocate_descriptor_sets(
    device: &ash::Device,
    pool: vk::DescriptorPool,
    layouts: &[vk::DescriptorSetLayout],
) -> Result<Vec<vk::DescriptorSet>> {
    if layouts.is_empty() {
        return Ok(Vec::new());
    }

    let alloc_info = vk::DescriptorSetAllocateInfo::builder()
        .descriptor_pool(pool)
        .set_layouts(layouts);

    unsafe { device.allocate_descriptor_sets(&alloc_info) }.context("Could not allocate descriptor sets")
}

#[derive(Debug, Clone)]
pub struct ImageDescriptorInfo {
    pub target_set: vk::DescriptorSet,
    pub target_binding: u32,
    pub target_array_element: u32,
    pub descriptor_type: vk::DescriptorType,
    pub image_infos: Vec<vk::DescriptorImageInfo>,
}

#[derive(Debug, Clone)]
pub struct BufferDescriptorInfo {
    pub target_set: vk::DescriptorSet,
    pub target_binding: u32,
    pub target_array_element: u32,
    pub descriptor_type: vk::DescriptorType,
    pub buffer_infos: Vec<vk::DescriptorBufferInfo>,
}

#[derive(Debug, Clone)]
pub struct TexelBufferDescriptorInfo {
    pub target_set: vk::DescriptorSet,
    pub target_binding: u32,
    pub target_array_element: u32,
    pub descriptor_type: vk::DescriptorType,
    pub texel_buffer_views: Vec<vk::BufferView>,
}

#[derive(Debug, Clone, Copy)]
pub struct CopyDescriptorInfo {
    pub source_set: vk::DescriptorSet,
    pub source_binding: u32,
    pub source_array_element: u32,
    pub target_set: vk::DescriptorSet,
    pub target_binding: u32,
    pub target_array_element: u32,
    pub descriptor_count: u32,
}

// Writes point into the info vectors; keep them alive until the update call.
fn descriptor_writes(
    image_infos: &[ImageDescriptorInfo],
    buffer_infos: &[BufferDescriptorInfo],
    texel_buffer_infos: &[TexelBufferDescriptorInfo],
) -> Vec<vk::WriteDescriptorSet> {
    let images = image_infos.iter().filter(|i| !i.image_infos.is_empty()).map(|info| {
        vk::WriteDescriptorSet::builder()
            .dst_set(info.target_set)
            .dst_binding(info.target_binding)
            .dst_array_element(info.target_array_element)
            .descriptor_type(info.descriptor_type)
            .image_info(&info.image_infos)
            .build()
    });

    let buffers = buffer_infos.iter().filter(|i| !i.buffer_infos.is_empty()).map(|info| {
        vk::WriteDescriptorSet::builder()
            .dst_set(info.target_set)
            .dst_binding(info.target_binding)
            .dst_array_element(info.target_array_element)
            .descriptor_type(info.descriptor_type)
            .buffer_info(&info.buffer_infos)
            .build()
    });

    let texels = texel_buffer_infos
        .iter()
        .filter(|i| !i.texel_buffer_views.is_empty())
        .map(|info| {
            vk::WriteDescriptorSet::builder()
                .dst_set(info.target_set)
                .dst_binding(info.target_binding)
                .dst_array_element(info.target_array_element)
                .descriptor_type(info.descriptor_type)
                .texel_buffer_view(&info.texel_buffer_views)
                .build()
        });

    images.chain(buffers).chain(texels).collect()
}

fn descriptor_copies(copy_infos: &[CopyDescriptorInfo]) -> Vec<vk::CopyDescriptorSet> {
    copy_infos
        .iter()
        .map(|info| {
            vk::CopyDescriptorSet::builder()
                .src_set(info.source_set)
                .src_binding(info.source_binding)
                .src_array_element(info.source_array_element)
                .dst_set(info.target_set)
                .dst_binding(info.target_binding)
                .dst_array_element(info.target_array_element)
                .descriptor_count(info.descriptor_count)
                .build()
        })
        .collect()
}

pub fn update_descriptor_sets(
    device: &ash::Device,
    image_infos: &[ImageDescriptorInfo],
    buffer_infos: &[BufferDescriptorInfo],
    texel_buffer_infos: &[TexelBufferDescriptorInfo],
    copy_infos: &[CopyDescriptorInfo],
) {
    let writes = descriptor_writes(image_infos, buffer_infos, texel_buffer_infos);
    let copies = descriptor_copies(copy_infos);

    if writes.is_empty() && copies.is_empty() {
        return;
    }

    unsafe { device.update_descriptor_sets(&writes, &copies) };
}

#[allow(clippy::too_many_arguments)]
pub fn bind_descriptor_sets(
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    bind_point: vk::PipelineBindPoint,
    layout: vk::PipelineLayout,
    first_set: u32,
    sets: &[vk::DescriptorSet],
    dynamic_offsets: &[u32],
) {
    if sets.is_empty() {
        return;
    }
    unsafe {
        device.cmd_bind_descriptor_sets(command_buffer, bind_point, layout, first_set, sets, dynamic_offsets);
    }
}

/// Everything created by [`create_descriptors_with_texture_and_uniform_buffer`]
pub struct TextureAndUniformBufferDescriptors {
    pub texture: CombinedImageSampler,
    pub uniform_buffer: BufferWithMemory,
    pub layout: vk::DescriptorSetLayout,
    pub pool: vk::DescriptorPool,
    pub set: vk::DescriptorSet,
}

impl TextureAndUniformBufferDescriptors {
    fn empty() -> Self {
        Self {
            texture: CombinedImageSampler {
                sampler: vk::Sampler::null(),
                image: ImageWithView {
                    image: vk::Image::null(),
                    memory: vk::DeviceMemory::null(),
                    view: vk::ImageView::null(),
                },
            },
            uniform_buffer: BufferWithMemory {
                buffer: vk::Buffer::null(),
                memory: vk::DeviceMemory::null(),
                size: 0,
            },
            layout: vk::DescriptorSetLayout::null(),
            pool: vk::DescriptorPool::null(),
            set: vk::DescriptorSet::null(),
        }
    }

    /// The set is released together with its pool.
    pub fn destroy(&mut self, device: &ash::Device) {
        destroy_descriptor_pool(device, &mut self.pool);
        self.set = vk::DescriptorSet::null();
        destroy_descriptor_set_layout(device, &mut self.layout);
        self.uniform_buffer.destroy(device);
        self.texture.destroy(device);
    }
}

/// Bindings of the texture + uniform buffer layout: a combined image sampler
/// read by fragment shaders at 0, a uniform buffer read by vertex shaders at 1.
pub fn texture_and_uniform_buffer_bindings() -> [vk::DescriptorSetLayoutBinding; 2] {
    [
        vk::DescriptorSetLayoutBinding::builder()
            .binding(0)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .descriptor_count(1)
            .stage_flags(vk::ShaderStageFlags::FRAGMENT)
            .build(),
        vk::DescriptorSetLayoutBinding::builder()
            .binding(1)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .descriptor_count(1)
            .stage_flags(vk::ShaderStageFlags::VERTEX)
            .build(),
    ]
}

/// Combined image sampler + uniform buffer, with a layout, pool and set
/// that already point at both.
pub fn create_descriptors_with_texture_and_uniform_buffer(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: &ash::Device,
    sampled_image_size: vk::Extent2D,
    uniform_buffer_size: vk::DeviceSize,
) -> Result<TextureAndUniformBufferDescriptors> {
    let mut out = TextureAndUniformBufferDescriptors::empty();

    let result = (|| -> Result<()> {
        out.texture = create_combined_image_sampler(
            instance,
            physical_device,
            device,
            &ImageParameters::new_2d(vk::Format::R8G8B8A8_UNORM, sampled_image_size, vk::ImageUsageFlags::TRANSFER_DST),
            vk::ImageViewType::TYPE_2D,
            vk::ImageAspectFlags::COLOR,
            &SamplerParameters::default(),
        )?;

        out.uniform_buffer = create_uniform_buffer(
            instance,
            physical_device,
            device,
            uniform_buffer_size,
            vk::BufferUsageFlags::TRANSFER_DST,
        )?;

        out.layout = create_descriptor_set_layout(device, &texture_and_uniform_buffer_bindings())?;

        out.pool = create_descriptor_pool(
            device,
            false,
            1,
            &[
                vk::DescriptorPoolSize {
                    ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                    descriptor_count: 1,
                },
                vk::DescriptorPoolSize {
                    ty: vk::DescriptorType::UNIFORM_BUFFER,
                    descriptor_count: 1,
                },
            ],
        )?;

        out.set = allocate_descriptor_sets(device, out.pool, &[out.layout])?
            .into_iter()
            .next()
            .context("Descriptor set allocation returned nothing")?;

        update_descriptor_sets(
            device,
            &[ImageDescriptorInfo {
                target_set: out.set,
                target_binding: 0,
                target_array_element: 0,
                descriptor_type: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                image_infos: vec![vk::DescriptorImageInfo {
                    sampler: out.texture.sampler,
                    image_view: out.texture.image.view,
                    image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                }],
            }],
            &[BufferDescriptorInfo {
                target_set: out.set,
                target_binding: 1,
                target_array_element: 0,
                descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
                buffer_infos: vec![vk::DescriptorBufferInfo {
                    buffer: out.uniform_buffer.buffer,
                    offset: 0,
                    range: vk::WHOLE_SIZE,
                }],
            }],
            &[],
            &[],
        );

        Ok(())
    })();

    match result {
        Ok(()) => Ok(out),
        Err(e) => {
            out.destroy(device);
            Err(e)
        }
    }
}

/// No-op for an empty list; otherwise the pool needs FREE_DESCRIPTOR_SET.
pub fn free_descriptor_sets(
    device: &ash::Device,
    pool: vk::DescriptorPool,
    sets: &mut Vec<vk::DescriptorSet>,
) -> Result<()> {
    if sets.is_empty() {
        return Ok(());
    }

    unsafe { device.free_descriptor_sets(pool, sets.as_slice()) }.context("Error occurred during freeing descriptor sets")?;
    sets.clear();
    Ok(())
}

pub fn reset_descriptor_pool(device: &ash::Device, pool: vk::DescriptorPool) -> Result<()> {
    unsafe { device.reset_descriptor_pool(pool, vk::DescriptorPoolResetFlags::empty()) }
        .context("Error occurred during descriptor pool reset")
}

pub fn destroy_descriptor_pool(device: &ash::Device, pool: &mut vk::DescriptorPool) {
    if *pool != vk::DescriptorPool::null() {
        unsafe { device.destroy_descriptor_pool(*pool, None) };
        *pool = vk::DescriptorPool::null();
    }
}

pub fn destroy_descriptor_set_layout(device: &ash::Device, layout: &mut vk::DescriptorSetLayout) {
    if *layout != vk::DescriptorSetLayout::null() {
        unsafe { device.destroy_descriptor_set_layout(*layout, None) };
        *layout = vk::DescriptorSetLayout::null();
    }
}

pub fn destroy_sampler(device: &ash::Device, sampler: &mut vk::Sampler) {
    if *sampler != vk::Sampler::null() {
        unsafe { device.destroy_sampler(*sampler, None) };
        *sampler = vk::Sampler::null();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    fn optimal(features: vk::FormatFeatureFlags) -> vk::FormatProperties {
        vk::FormatProperties {
            optimal_tiling_features: features,
            ..Default::default()
        }
    }

    #[test]
    fn sampled_image_needs_linear_filter_only_when_requested() {
        let props = optimal(vk::FormatFeatureFlags::SAMPLED_IMAGE);
        assert!(supports_sampled_image(&props, false));
        assert!(!supports_sampled_image(&props, true));

        let props = optimal(vk::FormatFeatureFlags::SAMPLED_IMAGE | vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR);
        assert!(supports_sampled_image(&props, true));
    }

    #[test]
    fn storage_image_atomics() {
        let props = optimal(vk::FormatFeatureFlags::STORAGE_IMAGE);
        assert!(supports_storage_image(&props, false));
        assert!(!supports_storage_image(&props, true));
        assert!(!supports_storage_image(&optimal(vk::FormatFeatureFlags::empty()), false));
    }

    #[test]
    fn texel_buffers_check_buffer_features() {
        let props = vk::FormatProperties {
            optimal_tiling_features: vk::FormatFeatureFlags::UNIFORM_TEXEL_BUFFER,
            buffer_features: vk::FormatFeatureFlags::STORAGE_TEXEL_BUFFER,
            ..Default::default()
        };

        assert!(!supports_uniform_texel_buffer(&props));
        assert!(supports_storage_texel_buffer(&props, false));
        assert!(!supports_storage_texel_buffer(&props, true));
    }

    #[test]
    fn input_attachment_checks_aspect() {
        let color = optimal(vk::FormatFeatureFlags::COLOR_ATTACHMENT);
        assert!(supports_input_attachment(&color, vk::ImageAspectFlags::COLOR));
        assert!(!supports_input_attachment(&color, vk::ImageAspectFlags::DEPTH));

        let depth = optimal(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT);
        assert!(supports_input_attachment(&depth, vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL));
        assert!(!supports_input_attachment(&depth, vk::ImageAspectFlags::COLOR));
    }

    #[test]
    fn writes_skip_empty_infos_and_keep_counts() {
        let set = vk::DescriptorSet::from_raw(3);
        let images = [ImageDescriptorInfo {
            target_set: set,
            target_binding: 0,
            target_array_element: 0,
            descriptor_type: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            image_infos: vec![vk::DescriptorImageInfo::default(); 2],
        }];
        let buffers = [
            BufferDescriptorInfo {
                target_set: set,
                target_binding: 1,
                target_array_element: 0,
                descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
                buffer_infos: vec![vk::DescriptorBufferInfo::default()],
            },
            BufferDescriptorInfo {
                target_set: set,
                target_binding: 2,
                target_array_element: 0,
                descriptor_type: vk::DescriptorType::STORAGE_BUFFER,
                buffer_infos: Vec::new(),
            },
        ];

        let writes = descriptor_writes(&images, &buffers, &[]);

        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].descriptor_count, 2);
        assert_eq!(writes[0].dst_binding, 0);
        assert_eq!(writes[1].descriptor_count, 1);
        assert_eq!(writes[1].descriptor_type, vk::DescriptorType::UNIFORM_BUFFER);
        assert_eq!(writes[1].dst_set, set);
    }

    #[test]
    fn copies_map_all_fields() {
        let copies = descriptor_copies(&[CopyDescriptorInfo {
            source_set: vk::DescriptorSet::from_raw(1),
            source_binding: 4,
            source_array_element: 1,
            target_set: vk::DescriptorSet::from_raw(2),
            target_binding: 5,
            target_array_element: 0,
            descriptor_count: 3,
        }]);

        assert_eq!(copies[0].src_binding, 4);
        assert_eq!(copies[0].dst_set, vk::DescriptorSet::from_raw(2));
        assert_eq!(copies[0].descriptor_count, 3);
    }

    #[test]
    fn texture_and_uniform_layout_bindings() {
        let bindings = texture_and_uniform_buffer_bindings();
        assert_eq!(bindings[0].descriptor_type, vk::DescriptorType::COMBINED_IMAGE_SAMPLER);
        assert_eq!(bindings[0].stage_flags, vk::ShaderStageFlags::FRAGMENT);
        assert_eq!(bindings[1].binding, 1);
        assert_eq!(bindings[1].stage_flags, vk::ShaderStageFlags::VERTEX);
    }
}
