// Drawing recipes
//
// Clears, resource binding, dynamic state, draw and dispatch commands, and a
// complete recording of one frame of geometry.

use anyhow::Result;
use ash::vk;

use super::command::{begin_command_buffer_recording, end_command_buffer_recording};
use super::descriptor::bind_descriptor_sets;
use super::image::{set_image_memory_barrier, ImageTransition};
use super::pipeline::bind_pipeline_object;
use super::render_pass::{begin_render_pass, end_render_pass};
use crate::helpers::mesh::MeshPart;

pub fn clear_color_image(
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    image: vk::Image,
    image_layout: vk::ImageLayout,
    ranges: &[vk::ImageSubresourceRange],
    clear_color: vk::ClearColorValue,
) {
    unsafe { device.cmd_clear_color_image(command_buffer, image, image_layout, &clear_color, ranges) };
}

pub fn clear_depth_stencil_image(
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    image: vk::Image,
    image_layout: vk::ImageLayout,
    ranges: &[vk::ImageSubresourceRange],
    clear_value: vk::ClearDepthStencilValue,
) {
    unsafe { device.cmd_clear_depth_stencil_image(command_buffer, image, image_layout, &clear_value, ranges) };
}

/// Only valid inside a render pass.
pub fn clear_render_pass_attachments(
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    attachments: &[vk::ClearAttachment],
    rects: &[vk::ClearRect],
) {
    if attachments.is_empty() || rects.is_empty() {
        return;
    }
    unsafe { device.cmd_clear_attachments(command_buffer, attachments, rects) };
}

#[derive(Debug, Clone, Copy)]
pub struct VertexBufferParameters {
    pub buffer: vk::Buffer,
    pub memory_offset: vk::DeviceSize,
}

fn split_vertex_buffer_parameters(params: &[VertexBufferParameters]) -> (Vec<vk::Buffer>, Vec<vk::DeviceSize>) {
    params.iter().map(|p| (p.buffer, p.memory_offset)).unzip()
}

pub fn bind_vertex_buffers(
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    first_binding: u32,
    buffers_parameters: &[VertexBufferParameters],
) {
    if buffers_parameters.is_empty() {
        return;
    }

    let (buffers, offsets) = split_vertex_buffer_parameters(buffers_parameters);
    unsafe { device.cmd_bind_vertex_buffers(command_buffer, first_binding, &buffers, &offsets) };
}

pub fn bind_index_buffer(
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    buffer: vk::Buffer,
    memory_offset: vk::DeviceSize,
    index_type: vk::IndexType,
) {
    unsafe { device.cmd_bind_index_buffer(command_buffer, buffer, memory_offset, index_type) };
}

/// Offset and size must both be multiples of 4.
pub fn provide_data_to_shaders_through_push_constants(
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    pipeline_layout: vk::PipelineLayout,
    pipeline_stages: vk::ShaderStageFlags,
    offset: u32,
    data: &[u8],
) -> Result<()> {
    if offset % 4 != 0 || data.len() % 4 != 0 {
        anyhow::bail!(
            "Push constant offset {} and size {} must be multiples of 4",
            offset,
            data.len()
        );
    }

    unsafe { device.cmd_push_constants(command_buffer, pipeline_layout, pipeline_stages, offset, data) };
    Ok(())
}

pub fn set_viewport_state_dynamically(
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    first_viewport: u32,
    viewports: &[vk::Viewport],
) {
    unsafe { device.cmd_set_viewport(command_buffer, first_viewport, viewports) };
}

pub fn set_scissor_state_dynamically(
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    first_scissor: u32,
    scissors: &[vk::Rect2D],
) {
    unsafe { device.cmd_set_scissor(command_buffer, first_scissor, scissors) };
}

pub fn set_line_width_state_dynamically(device: &ash::Device, command_buffer: vk::CommandBuffer, line_width: f32) {
    unsafe { device.cmd_set_line_width(command_buffer, line_width) };
}

pub fn set_depth_bias_state_dynamically(
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    constant_factor: f32,
    clamp: f32,
    slope_factor: f32,
) {
    unsafe { device.cmd_set_depth_bias(command_buffer, constant_factor, clamp, slope_factor) };
}

pub fn set_blend_constants_state_dynamically(
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    blend_constants: [f32; 4],
) {
    unsafe { device.cmd_set_blend_constants(command_buffer, &blend_constants) };
}

pub fn draw_geometry(
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    vertex_count: u32,
    instance_count: u32,
    first_vertex: u32,
    first_instance: u32,
) {
    unsafe { device.cmd_draw(command_buffer, vertex_count, instance_count, first_vertex, first_instance) };
}

pub fn draw_indexed_geometry(
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    index_count: u32,
    instance_count: u32,
    first_index: u32,
    vertex_offset: i32,
    first_instance: u32,
) {
    unsafe {
        device.cmd_draw_indexed(
            command_buffer,
            index_count,
            instance_count,
            first_index,
            vertex_offset,
            first_instance,
        );
    }
}

pub fn dispatch_compute_work(device: &ash::Device, command_buffer: vk::CommandBuffer, x: u32, y: u32, z: u32) {
    unsafe { device.cmd_dispatch(command_buffer, x, y, z) };
}

/// Inputs for [`record_command_buffer_that_draws_geometry_with_dynamic_viewport_and_scissor_states`]
#[derive(Clone, Copy)]
pub struct GeometryRecording<'a> {
    pub swapchain_image: vk::Image,
    pub present_queue_family: u32,
    pub graphics_queue_family: u32,
    pub render_pass: vk::RenderPass,
    pub framebuffer: vk::Framebuffer,
    pub extent: vk::Extent2D,
    pub clear_values: &'a [vk::ClearValue],
    pub pipeline: vk::Pipeline,
    pub pipeline_layout: vk::PipelineLayout,
    pub descriptor_sets: &'a [vk::DescriptorSet],
    pub vertex_buffers: &'a [VertexBufferParameters],
    pub parts: &'a [MeshPart],
}

/// Ownership transfer of the swapchain image between two distinct families.
/// `None` when presentation and graphics share a family.
fn queue_ownership_transfer(image: vk::Image, from_family: u32, to_family: u32) -> Option<ImageTransition> {
    if from_family == to_family {
        return None;
    }

    Some(ImageTransition {
        current_queue_family: from_family,
        new_queue_family: to_family,
        ..ImageTransition::new(
            image,
            vk::AccessFlags::MEMORY_READ,
            vk::AccessFlags::MEMORY_READ,
            vk::ImageLayout::PRESENT_SRC_KHR,
            vk::ImageLayout::PRESENT_SRC_KHR,
            vk::ImageAspectFlags::COLOR,
        )
    })
}

/// Record a full frame: render pass over the whole framebuffer, viewport and
/// scissor set to `extent`, one draw per mesh part.
pub fn record_command_buffer_that_draws_geometry_with_dynamic_viewport_and_scissor_states(
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    recording: &GeometryRecording<'_>,
) -> Result<()> {
    begin_command_buffer_recording(device, command_buffer, vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT, None)?;

    if let Some(transition) = queue_ownership_transfer(
        recording.swapchain_image,
        recording.present_queue_family,
        recording.graphics_queue_family,
    ) {
        set_image_memory_barrier(
            device,
            command_buffer,
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            &[transition],
        );
    }

    let render_area = vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent: recording.extent,
    };

    begin_render_pass(
        device,
        command_buffer,
        recording.render_pass,
        recording.framebuffer,
        render_area,
        recording.clear_values,
        vk::SubpassContents::INLINE,
    );

    bind_pipeline_object(device, command_buffer, vk::PipelineBindPoint::GRAPHICS, recording.pipeline);

    set_viewport_state_dynamically(
        device,
        command_buffer,
        0,
        &[vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: recording.extent.width as f32,
            height: recording.extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }],
    );
    set_scissor_state_dynamically(device, command_buffer, 0, &[render_area]);

    bind_vertex_buffers(device, command_buffer, 0, recording.vertex_buffers);

    bind_descriptor_sets(
        device,
        command_buffer,
        vk::PipelineBindPoint::GRAPHICS,
        recording.pipeline_layout,
        0,
        recording.descriptor_sets,
        &[],
    );

    for part in recording.parts {
        draw_geometry(device, command_buffer, part.vertex_count, 1, part.vertex_offset, 0);
    }

    end_render_pass(device, command_buffer);

    if let Some(transition) = queue_ownership_transfer(
        recording.swapchain_image,
        recording.graphics_queue_family,
        recording.present_queue_family,
    ) {
        set_image_memory_barrier(
            device,
            command_buffer,
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            vk::PipelineStageFlags::BOTTOM_OF_PIPE,
            &[transition],
        );
    }

    end_command_buffer_recording(device, command_buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    #[test]
    fn vertex_buffer_parameters_split_in_order() {
        let params = [
            VertexBufferParameters {
                buffer: vk::Buffer::from_raw(1),
                memory_offset: 0,
            },
            VertexBufferParameters {
                buffer: vk::Buffer::from_raw(2),
                memory_offset: 64,
            },
        ];

        let (buffers, offsets) = split_vertex_buffer_parameters(&params);
        assert_eq!(buffers, vec![vk::Buffer::from_raw(1), vk::Buffer::from_raw(2)]);
        assert_eq!(offsets, vec![0, 64]);
    }

    #[test]
    fn no_ownership_transfer_within_one_family() {
        assert!(queue_ownership_transfer(vk::Image::null(), 0, 0).is_none());
    }

    #[test]
    fn ownership_transfer_between_families() {
        let transition = queue_ownership_transfer(vk::Image::from_raw(9), 1, 0).unwrap();
        assert_eq!(transition.current_queue_family, 1);
        assert_eq!(transition.new_queue_family, 0);
        assert_eq!(transition.current_layout, vk::ImageLayout::PRESENT_SRC_KHR);
        assert_eq!(transition.new_layout, vk::ImageLayout::PRESENT_SRC_KHR);
    }
}
