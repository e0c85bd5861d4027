// Pipeline recipes
//
// The graphics pipeline is assembled from independent state blocks: vertex
// input, input assembly, tessellation, viewport, rasterization, multisample,
// depth/stencil, blending and dynamic state. Each block has its own builder
// below so pipelines can mix and match them.
//
// Builders return ash builder types, which keep the borrowed slices alive for
// as long as the state is in use.

use std::path::Path;

use anyhow::{Context, Result};
use ash::vk;

use super::descriptor::{create_descriptor_set_layout, destroy_descriptor_set_layout, texture_and_uniform_buffer_bindings};
use super::shader::{
    create_shader_module, destroy_shader_module, load_spirv_from_file, specify_pipeline_shader_stages,
    ShaderStageParameters,
};

// ---------------------------------------------------------------------------
// Fixed-function state
// ---------------------------------------------------------------------------

pub fn specify_pipeline_vertex_input_state<'a>(
    bindings: &'a [vk::VertexInputBindingDescription],
    attributes: &'a [vk::VertexInputAttributeDescription],
) -> vk::PipelineVertexInputStateCreateInfoBuilder<'a> {
    vk::PipelineVertexInputStateCreateInfo::builder()
        .vertex_binding_descriptions(bindings)
        .vertex_attribute_descriptions(attributes)
}

fn is_list_topology(topology: vk::PrimitiveTopology) -> bool {
    matches!(
        topology,
        vk::PrimitiveTopology::POINT_LIST
            | vk::PrimitiveTopology::LINE_LIST
            | vk::PrimitiveTopology::TRIANGLE_LIST
            | vk::PrimitiveTopology::LINE_LIST_WITH_ADJACENCY
            | vk::PrimitiveTopology::TRIANGLE_LIST_WITH_ADJACENCY
            | vk::PrimitiveTopology::PATCH_LIST
    )
}

/// Primitive restart is only valid for strip and fan topologies.
pub fn specify_pipeline_input_assembly_state(
    topology: vk::PrimitiveTopology,
    primitive_restart_enable: bool,
) -> Result<vk::PipelineInputAssemblyStateCreateInfo> {
    if primitive_restart_enable && is_list_topology(topology) {
        log::error!("Primitive restart requested for list topology {:?}", topology);
        anyhow::bail!("Primitive restart is not allowed with {:?}", topology);
    }

    Ok(vk::PipelineInputAssemblyStateCreateInfo::builder()
        .topology(topology)
        .primitive_restart_enable(primitive_restart_enable)
        .build())
}

pub fn specify_pipeline_tessellation_state(patch_control_points: u32) -> vk::PipelineTessellationStateCreateInfo {
    vk::PipelineTessellationStateCreateInfo::builder()
        .patch_control_points(patch_control_points)
        .build()
}

#[derive(Debug, Clone, Default)]
pub struct ViewportInfo {
    pub viewports: Vec<vk::Viewport>,
    pub scissors: Vec<vk::Rect2D>,
}

impl ViewportInfo {
    /// One viewport and a matching scissor covering `extent`
    pub fn full(extent: vk::Extent2D) -> Self {
        Self {
            viewports: vec![vk::Viewport {
                x: 0.0,
                y: 0.0,
                width: extent.width as f32,
                height: extent.height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            }],
            scissors: vec![vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            }],
        }
    }
}

pub fn specify_pipeline_viewport_and_scissor_test_state(
    info: &ViewportInfo,
) -> Result<vk::PipelineViewportStateCreateInfoBuilder<'_>> {
    if info.viewports.len() != info.scissors.len() {
        log::error!(
            "Incorrect number of scissor rectangles: {} viewports, {} scissors",
            info.viewports.len(),
            info.scissors.len()
        );
        anyhow::bail!("Viewport and scissor counts differ");
    }

    Ok(vk::PipelineViewportStateCreateInfo::builder()
        .viewports(&info.viewports)
        .scissors(&info.scissors))
}

#[derive(Debug, Clone, Copy)]
pub struct RasterizationParameters {
    pub depth_clamp_enable: bool,
    pub rasterizer_discard_enable: bool,
    pub polygon_mode: vk::PolygonMode,
    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
    pub depth_bias_enable: bool,
    pub depth_bias_constant_factor: f32,
    pub depth_bias_clamp: f32,
    pub depth_bias_slope_factor: f32,
    pub line_width: f32,
}

impl Default for RasterizationParameters {
    fn default() -> Self {
        Self {
            depth_clamp_enable: false,
            rasterizer_discard_enable: false,
            polygon_mode: vk::PolygonMode::FILL,
            cull_mode: vk::CullModeFlags::BACK,
            front_face: vk::FrontFace::COUNTER_CLOCKWISE,
            depth_bias_enable: false,
            depth_bias_constant_factor: 0.0,
            depth_bias_clamp: 0.0,
            depth_bias_slope_factor: 0.0,
            line_width: 1.0,
        }
    }
}

pub fn specify_pipeline_rasterization_state(params: &RasterizationParameters) -> vk::PipelineRasterizationStateCreateInfo {
    vk::PipelineRasterizationStateCreateInfo::builder()
        .depth_clamp_enable(params.depth_clamp_enable)
        .rasterizer_discard_enable(params.rasterizer_discard_enable)
        .polygon_mode(params.polygon_mode)
        .cull_mode(params.cull_mode)
        .front_face(params.front_face)
        .depth_bias_enable(params.depth_bias_enable)
        .depth_bias_constant_factor(params.depth_bias_constant_factor)
        .depth_bias_clamp(params.depth_bias_clamp)
        .depth_bias_slope_factor(params.depth_bias_slope_factor)
        .line_width(params.line_width)
        .build()
}

/// `sample_masks` may be empty, meaning all samples are enabled.
pub fn specify_pipeline_multisample_state(
    sample_count: vk::SampleCountFlags,
    per_sample_shading_enable: bool,
    min_sample_shading: f32,
    sample_masks: &[vk::SampleMask],
    alpha_to_coverage_enable: bool,
    alpha_to_one_enable: bool,
) -> vk::PipelineMultisampleStateCreateInfoBuilder<'_> {
    let mut state = vk::PipelineMultisampleStateCreateInfo::builder()
        .rasterization_samples(sample_count)
        .sample_shading_enable(per_sample_shading_enable)
        .min_sample_shading(min_sample_shading)
        .alpha_to_coverage_enable(alpha_to_coverage_enable)
        .alpha_to_one_enable(alpha_to_one_enable);
    if !sample_masks.is_empty() {
        state = state.sample_mask(sample_masks);
    }
    state
}

#[derive(Debug, Clone, Copy)]
pub struct DepthStencilParameters {
    pub depth_test_enable: bool,
    pub depth_write_enable: bool,
    pub depth_compare_op: vk::CompareOp,
    pub depth_bounds_test_enable: bool,
    pub min_depth_bounds: f32,
    pub max_depth_bounds: f32,
    pub stencil_test_enable: bool,
    pub front: vk::StencilOpState,
    pub back: vk::StencilOpState,
}

impl Default for DepthStencilParameters {
    fn default() -> Self {
        Self {
            depth_test_enable: true,
            depth_write_enable: true,
            depth_compare_op: vk::CompareOp::LESS_OR_EQUAL,
            depth_bounds_test_enable: false,
            min_depth_bounds: 0.0,
            max_depth_bounds: 1.0,
            stencil_test_enable: false,
            front: vk::StencilOpState::default(),
            back: vk::StencilOpState::default(),
        }
    }
}

pub fn specify_pipeline_depth_and_stencil_state(params: &DepthStencilParameters) -> vk::PipelineDepthStencilStateCreateInfo {
    vk::PipelineDepthStencilStateCreateInfo::builder()
        .depth_test_enable(params.depth_test_enable)
        .depth_write_enable(params.depth_write_enable)
        .depth_compare_op(params.depth_compare_op)
        .depth_bounds_test_enable(params.depth_bounds_test_enable)
        .min_depth_bounds(params.min_depth_bounds)
        .max_depth_bounds(params.max_depth_bounds)
        .stencil_test_enable(params.stencil_test_enable)
        .front(params.front)
        .back(params.back)
        .build()
}

/// Writes all components, blending disabled
pub fn opaque_color_blend_attachment() -> vk::PipelineColorBlendAttachmentState {
    vk::PipelineColorBlendAttachmentState::builder()
        .blend_enable(false)
        .src_color_blend_factor(vk::BlendFactor::ONE)
        .dst_color_blend_factor(vk::BlendFactor::ONE)
        .color_blend_op(vk::BlendOp::ADD)
        .src_alpha_blend_factor(vk::BlendFactor::ONE)
        .dst_alpha_blend_factor(vk::BlendFactor::ONE)
        .alpha_blend_op(vk::BlendOp::ADD)
        .color_write_mask(vk::ColorComponentFlags::RGBA)
        .build()
}

/// One attachment state per color attachment of the subpass
pub fn specify_pipeline_blend_state(
    logic_op_enable: bool,
    logic_op: vk::LogicOp,
    attachments: &[vk::PipelineColorBlendAttachmentState],
    blend_constants: [f32; 4],
) -> vk::PipelineColorBlendStateCreateInfoBuilder<'_> {
    vk::PipelineColorBlendStateCreateInfo::builder()
        .logic_op_enable(logic_op_enable)
        .logic_op(logic_op)
        .attachments(attachments)
        .blend_constants(blend_constants)
}

pub fn specify_pipeline_dynamic_states(dynamic_states: &[vk::DynamicState]) -> vk::PipelineDynamicStateCreateInfoBuilder<'_> {
    vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(dynamic_states)
}

// ---------------------------------------------------------------------------
// Layouts and pipelines
// ---------------------------------------------------------------------------

pub fn create_pipeline_layout(
    device: &ash::Device,
    set_layouts: &[vk::DescriptorSetLayout],
    push_constant_ranges: &[vk::PushConstantRange],
) -> Result<vk::PipelineLayout> {
    let layout_info = vk::PipelineLayoutCreateInfo::builder()
        .set_layouts(set_layouts)
        .push_constant_ranges(push_constant_ranges);

    unsafe { device.create_pipeline_layout(&layout_info, None) }.context("Could not create pipeline layout")
}

/// References to the state blocks of one graphics pipeline.
///
/// Optional blocks are left out of the create info when `None`.
#[derive(Clone, Copy)]
pub struct GraphicsPipelineDesc<'a> {
    pub flags: vk::PipelineCreateFlags,
    pub stages: &'a [vk::PipelineShaderStageCreateInfo],
    pub vertex_input: &'a vk::PipelineVertexInputStateCreateInfo,
    pub input_assembly: &'a vk::PipelineInputAssemblyStateCreateInfo,
    pub tessellation: Option<&'a vk::PipelineTessellationStateCreateInfo>,
    pub viewport: Option<&'a vk::PipelineViewportStateCreateInfo>,
    pub rasterization: &'a vk::PipelineRasterizationStateCreateInfo,
    pub multisample: Option<&'a vk::PipelineMultisampleStateCreateInfo>,
    pub depth_stencil: Option<&'a vk::PipelineDepthStencilStateCreateInfo>,
    pub blend: Option<&'a vk::PipelineColorBlendStateCreateInfo>,
    pub dynamic: Option<&'a vk::PipelineDynamicStateCreateInfo>,
    pub layout: vk::PipelineLayout,
    pub render_pass: vk::RenderPass,
    pub subpass: u32,
    pub base_pipeline_handle: vk::Pipeline,
    pub base_pipeline_index: i32,
}

pub fn specify_graphics_pipeline_creation_parameters<'a>(
    desc: &GraphicsPipelineDesc<'a>,
) -> vk::GraphicsPipelineCreateInfoBuilder<'a> {
    let mut info = vk::GraphicsPipelineCreateInfo::builder()
        .flags(desc.flags)
        .stages(desc.stages)
        .vertex_input_state(desc.vertex_input)
        .input_assembly_state(desc.input_assembly)
        .rasterization_state(desc.rasterization)
        .layout(desc.layout)
        .render_pass(desc.render_pass)
        .subpass(desc.subpass)
        .base_pipeline_handle(desc.base_pipeline_handle)
        .base_pipeline_index(desc.base_pipeline_index);

    if let Some(state) = desc.tessellation {
        info = info.tessellation_state(state);
    }
    if let Some(state) = desc.viewport {
        info = info.viewport_state(state);
    }
    if let Some(state) = desc.multisample {
        info = info.multisample_state(state);
    }
    if let Some(state) = desc.depth_stencil {
        info = info.depth_stencil_state(state);
    }
    if let Some(state) = desc.blend {
        info = info.color_blend_state(state);
    }
    if let Some(state) = desc.dynamic {
        info = info.dynamic_state(state);
    }
    info
}

/// All pipelines are created or none: partial results are destroyed on failure.
pub fn create_graphics_pipelines(
    device: &ash::Device,
    descs: &[GraphicsPipelineDesc<'_>],
    cache: vk::PipelineCache,
) -> Result<Vec<vk::Pipeline>> {
    if descs.is_empty() {
        return Ok(Vec::new());
    }

    let infos: Vec<vk::GraphicsPipelineCreateInfo> = descs
        .iter()
        .map(|desc| specify_graphics_pipeline_creation_parameters(desc).build())
        .collect();

    match unsafe { device.create_graphics_pipelines(cache, &infos, None) } {
        Ok(pipelines) => Ok(pipelines),
        Err((mut partial, e)) => {
            for pipeline in partial.iter_mut() {
                destroy_pipeline(device, pipeline);
            }
            Err(e).context("Could not create graphics pipeline")
        }
    }
}

pub fn create_pipeline_cache(device: &ash::Device, initial_data: &[u8]) -> Result<vk::PipelineCache> {
    let cache_info = vk::PipelineCacheCreateInfo::builder().initial_data(initial_data);

    unsafe { device.create_pipeline_cache(&cache_info, None) }.context("Could not create pipeline cache")
}

pub fn retrieve_data_from_pipeline_cache(device: &ash::Device, cache: vk::PipelineCache) -> Result<Vec<u8>> {
    unsafe { device.get_pipeline_cache_data(cache) }.context("Could not get pipeline cache data")
}

/// `target` must not be one of `sources`.
pub fn merge_multiple_pipeline_caches(
    device: &ash::Device,
    target: vk::PipelineCache,
    sources: &[vk::PipelineCache],
) -> Result<()> {
    if sources.is_empty() {
        return Ok(());
    }
    if sources.contains(&target) {
        anyhow::bail!("Pipeline cache cannot be merged into itself");
    }

    unsafe { device.merge_pipeline_caches(target, sources) }.context("Could not merge pipeline cache objects")
}

pub fn create_compute_pipeline(
    device: &ash::Device,
    flags: vk::PipelineCreateFlags,
    stage: &ShaderStageParameters<'_>,
    layout: vk::PipelineLayout,
    base_pipeline: vk::Pipeline,
    cache: vk::PipelineCache,
) -> Result<vk::Pipeline> {
    if stage.stage != vk::ShaderStageFlags::COMPUTE {
        anyhow::bail!("Compute pipeline needs a compute stage, got {:?}", stage.stage);
    }

    let stages = specify_pipeline_shader_stages(std::slice::from_ref(stage));
    let info = vk::ComputePipelineCreateInfo::builder()
        .flags(flags)
        .stage(stages[0])
        .layout(layout)
        .base_pipeline_handle(base_pipeline)
        .base_pipeline_index(-1)
        .build();

    match unsafe { device.create_compute_pipelines(cache, &[info], None) } {
        Ok(pipelines) => pipelines
            .into_iter()
            .next()
            .context("Compute pipeline creation returned nothing"),
        Err((mut partial, e)) => {
            for pipeline in partial.iter_mut() {
                destroy_pipeline(device, pipeline);
            }
            Err(e).context("Could not create compute pipeline")
        }
    }
}

pub fn bind_pipeline_object(
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    bind_point: vk::PipelineBindPoint,
    pipeline: vk::Pipeline,
) {
    unsafe { device.cmd_bind_pipeline(command_buffer, bind_point, pipeline) };
}

/// Set layout with a combined image sampler and a uniform buffer, plus a
/// pipeline layout using it together with `push_constant_ranges`
pub fn create_pipeline_layout_with_combined_image_sampler_buffer_and_push_constant_ranges(
    device: &ash::Device,
    push_constant_ranges: &[vk::PushConstantRange],
) -> Result<(vk::DescriptorSetLayout, vk::PipelineLayout)> {
    let mut set_layout = create_descriptor_set_layout(device, &texture_and_uniform_buffer_bindings())?;

    match create_pipeline_layout(device, &[set_layout], push_constant_ranges) {
        Ok(layout) => Ok((set_layout, layout)),
        Err(e) => {
            destroy_descriptor_set_layout(device, &mut set_layout);
            Err(e)
        }
    }
}

/// Vertex + fragment pipeline with depth testing; viewport and scissor are
/// dynamic so the pipeline survives swapchain resizes.
///
/// Shader modules only live for the duration of the call.
#[allow(clippy::too_many_arguments)]
pub fn create_graphics_pipeline_with_vertex_and_fragment_shaders_depth_test_and_dynamic_viewport_and_scissor(
    device: &ash::Device,
    vertex_shader: &Path,
    fragment_shader: &Path,
    vertex_bindings: &[vk::VertexInputBindingDescription],
    vertex_attributes: &[vk::VertexInputAttributeDescription],
    topology: vk::PrimitiveTopology,
    layout: vk::PipelineLayout,
    render_pass: vk::RenderPass,
    subpass: u32,
    cache: vk::PipelineCache,
) -> Result<vk::Pipeline> {
    let vertex_code = load_spirv_from_file(vertex_shader)?;
    let fragment_code = load_spirv_from_file(fragment_shader)?;

    let mut vertex_module = create_shader_module(device, &vertex_code)?;
    let mut fragment_module = match create_shader_module(device, &fragment_code) {
        Ok(module) => module,
        Err(e) => {
            destroy_shader_module(device, &mut vertex_module);
            return Err(e);
        }
    };

    let result = (|| {
        let stage_params = [
            ShaderStageParameters::new(vk::ShaderStageFlags::VERTEX, vertex_module),
            ShaderStageParameters::new(vk::ShaderStageFlags::FRAGMENT, fragment_module),
        ];
        let stages = specify_pipeline_shader_stages(&stage_params);

        let vertex_input = specify_pipeline_vertex_input_state(vertex_bindings, vertex_attributes);
        let input_assembly = specify_pipeline_input_assembly_state(topology, false)?;

        // Actual values come from vkCmdSetViewport/vkCmdSetScissor.
        let viewport_info = ViewportInfo::full(vk::Extent2D { width: 500, height: 500 });
        let viewport = specify_pipeline_viewport_and_scissor_test_state(&viewport_info)?;

        let rasterization = specify_pipeline_rasterization_state(&RasterizationParameters::default());
        let multisample = specify_pipeline_multisample_state(vk::SampleCountFlags::TYPE_1, false, 0.0, &[], false, false);
        let depth_stencil = specify_pipeline_depth_and_stencil_state(&DepthStencilParameters::default());

        let blend_attachments = [opaque_color_blend_attachment()];
        let blend = specify_pipeline_blend_state(false, vk::LogicOp::COPY, &blend_attachments, [1.0; 4]);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic = specify_pipeline_dynamic_states(&dynamic_states);

        let desc = GraphicsPipelineDesc {
            flags: vk::PipelineCreateFlags::empty(),
            stages: &stages,
            vertex_input: &*vertex_input,
            input_assembly: &input_assembly,
            tessellation: None,
            viewport: Some(&*viewport),
            rasterization: &rasterization,
            multisample: Some(&*multisample),
            depth_stencil: Some(&depth_stencil),
            blend: Some(&*blend),
            dynamic: Some(&*dynamic),
            layout,
            render_pass,
            subpass,
            base_pipeline_handle: vk::Pipeline::null(),
            base_pipeline_index: -1,
        };

        create_graphics_pipelines(device, &[desc], cache)?
            .into_iter()
            .next()
            .context("Graphics pipeline creation returned nothing")
    })();

    destroy_shader_module(device, &mut fragment_module);
    destroy_shader_module(device, &mut vertex_module);

    if let Ok(pipeline) = &result {
        log::debug!("Created graphics pipeline {:?}", pipeline);
    }
    result
}

pub fn destroy_pipeline(device: &ash::Device, pipeline: &mut vk::Pipeline) {
    if *pipeline != vk::Pipeline::null() {
        unsafe { device.destroy_pipeline(*pipeline, None) };
        *pipeline = vk::Pipeline::null();
    }
}

pub fn destroy_pipeline_cache(device: &ash::Device, cache: &mut vk::PipelineCache) {
    if *cache != vk::PipelineCache::null() {
        unsafe { device.destroy_pipeline_cache(*cache, None) };
        *cache = vk::PipelineCache::null();
    }
}

pub fn destroy_pipeline_layout(device: &ash::Device, layout: &mut vk::PipelineLayout) {
    if *layout != vk::PipelineLayout::null() {
        unsafe { device.destroy_pipeline_layout(*layout, None) };
        *layout = vk::PipelineLayout::null();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_input_counts() {
        let bindings = [vk::VertexInputBindingDescription {
            binding: 0,
            stride: 20,
            input_rate: vk::VertexInputRate::VERTEX,
        }];
        let attributes = [
            vk::VertexInputAttributeDescription {
                location: 0,
                binding: 0,
                format: vk::Format::R32G32_SFLOAT,
                offset: 0,
            },
            vk::VertexInputAttributeDescription {
                location: 1,
                binding: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: 8,
            },
        ];

        let state = specify_pipeline_vertex_input_state(&bindings, &attributes);
        assert_eq!(state.vertex_binding_description_count, 1);
        assert_eq!(state.vertex_attribute_description_count, 2);
    }

    #[test]
    fn primitive_restart_only_for_strips_and_fans() {
        assert!(specify_pipeline_input_assembly_state(vk::PrimitiveTopology::TRIANGLE_LIST, true).is_err());
        assert!(specify_pipeline_input_assembly_state(vk::PrimitiveTopology::PATCH_LIST, true).is_err());

        let state = specify_pipeline_input_assembly_state(vk::PrimitiveTopology::TRIANGLE_STRIP, true).unwrap();
        assert_eq!(state.topology, vk::PrimitiveTopology::TRIANGLE_STRIP);
        assert_eq!(state.primitive_restart_enable, vk::TRUE);

        assert!(specify_pipeline_input_assembly_state(vk::PrimitiveTopology::LINE_LIST, false).is_ok());
    }

    #[test]
    fn viewport_and_scissor_counts_must_match() {
        let mut info = ViewportInfo::full(vk::Extent2D { width: 800, height: 600 });
        let state = specify_pipeline_viewport_and_scissor_test_state(&info).unwrap();
        assert_eq!(state.viewport_count, 1);
        assert_eq!(state.scissor_count, 1);

        info.scissors.clear();
        assert!(specify_pipeline_viewport_and_scissor_test_state(&info).is_err());
    }

    #[test]
    fn full_viewport_covers_extent() {
        let info = ViewportInfo::full(vk::Extent2D { width: 640, height: 480 });
        assert_eq!(info.viewports[0].width, 640.0);
        assert_eq!(info.viewports[0].max_depth, 1.0);
        assert_eq!(info.scissors[0].extent.height, 480);
    }

    #[test]
    fn rasterization_and_depth_defaults() {
        let raster = specify_pipeline_rasterization_state(&RasterizationParameters::default());
        assert_eq!(raster.polygon_mode, vk::PolygonMode::FILL);
        assert_eq!(raster.cull_mode, vk::CullModeFlags::BACK);
        assert_eq!(raster.line_width, 1.0);

        let depth = specify_pipeline_depth_and_stencil_state(&DepthStencilParameters::default());
        assert_eq!(depth.depth_test_enable, vk::TRUE);
        assert_eq!(depth.depth_compare_op, vk::CompareOp::LESS_OR_EQUAL);
        assert_eq!(depth.stencil_test_enable, vk::FALSE);
    }

    #[test]
    fn multisample_mask_is_optional() {
        let state = specify_pipeline_multisample_state(vk::SampleCountFlags::TYPE_4, false, 0.0, &[], false, false);
        assert!(state.p_sample_mask.is_null());
        assert_eq!(state.rasterization_samples, vk::SampleCountFlags::TYPE_4);

        let masks = [0xF];
        let state = specify_pipeline_multisample_state(vk::SampleCountFlags::TYPE_4, false, 0.0, &masks, false, false);
        assert!(!state.p_sample_mask.is_null());
    }

    #[test]
    fn blend_and_dynamic_states() {
        let attachments = [opaque_color_blend_attachment(); 2];
        let blend = specify_pipeline_blend_state(false, vk::LogicOp::COPY, &attachments, [0.5; 4]);
        assert_eq!(blend.attachment_count, 2);
        assert_eq!(blend.blend_constants, [0.5; 4]);
        assert_eq!(attachments[0].color_write_mask, vk::ColorComponentFlags::RGBA);

        let states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR, vk::DynamicState::LINE_WIDTH];
        assert_eq!(specify_pipeline_dynamic_states(&states).dynamic_state_count, 3);
    }

    #[test]
    fn optional_blocks_are_left_out() {
        let vertex_input = specify_pipeline_vertex_input_state(&[], &[]);
        let input_assembly = specify_pipeline_input_assembly_state(vk::PrimitiveTopology::TRIANGLE_LIST, false).unwrap();
        let rasterization = specify_pipeline_rasterization_state(&RasterizationParameters::default());
        let tessellation = specify_pipeline_tessellation_state(3);

        let desc = GraphicsPipelineDesc {
            flags: vk::PipelineCreateFlags::ALLOW_DERIVATIVES,
            stages: &[],
            vertex_input: &*vertex_input,
            input_assembly: &input_assembly,
            tessellation: Some(&tessellation),
            viewport: None,
            rasterization: &rasterization,
            multisample: None,
            depth_stencil: None,
            blend: None,
            dynamic: None,
            layout: vk::PipelineLayout::null(),
            render_pass: vk::RenderPass::null(),
            subpass: 1,
            base_pipeline_handle: vk::Pipeline::null(),
            base_pipeline_index: -1,
        };

        let info = specify_graphics_pipeline_creation_parameters(&desc).build();
        assert_eq!(info.flags, vk::PipelineCreateFlags::ALLOW_DERIVATIVES);
        assert!(!info.p_tessellation_state.is_null());
        assert!(info.p_viewport_state.is_null());
        assert!(info.p_depth_stencil_state.is_null());
        assert!(info.p_dynamic_state.is_null());
        assert_eq!(info.subpass, 1);
        assert_eq!(info.base_pipeline_index, -1);
    }
}
