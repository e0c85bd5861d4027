// Render pass recipes
//
// Attachment and subpass descriptions, render pass and framebuffer objects,
// and the commands that move a command buffer through a render pass.

use anyhow::{Context, Result};
use ash::vk;

use super::image::{create_2d_image_and_view, ImageWithView};

/// Attachments one subpass reads from and writes to
#[derive(Debug, Clone, Default)]
pub struct SubpassParameters {
    pub pipeline_type: vk::PipelineBindPoint,
    pub input_attachments: Vec<vk::AttachmentReference>,
    pub color_attachments: Vec<vk::AttachmentReference>,
    /// Empty, or one entry per color attachment
    pub resolve_attachments: Vec<vk::AttachmentReference>,
    pub depth_stencil_attachment: Option<vk::AttachmentReference>,
    pub preserve_attachments: Vec<u32>,
}

/// The returned descriptions point into `params`, which must outlive them.
pub fn specify_subpass_descriptions(params: &[SubpassParameters]) -> Result<Vec<vk::SubpassDescription>> {
    params
        .iter()
        .enumerate()
        .map(|(index, subpass)| {
            if !subpass.resolve_attachments.is_empty()
                && subpass.resolve_attachments.len() != subpass.color_attachments.len()
            {
                anyhow::bail!(
                    "Subpass {} has {} resolve attachments for {} color attachments",
                    index,
                    subpass.resolve_attachments.len(),
                    subpass.color_attachments.len()
                );
            }

            let mut description = vk::SubpassDescription::builder()
                .pipeline_bind_point(subpass.pipeline_type)
                .input_attachments(&subpass.input_attachments)
                .color_attachments(&subpass.color_attachments)
                .preserve_attachments(&subpass.preserve_attachments);

            if !subpass.resolve_attachments.is_empty() {
                description = description.resolve_attachments(&subpass.resolve_attachments);
            }
            if let Some(ref depth) = subpass.depth_stencil_attachment {
                description = description.depth_stencil_attachment(depth);
            }

            Ok(description.build())
        })
        .collect()
}

/// Single-sample color attachment cleared on load and stored
pub fn color_attachment_description(format: vk::Format, final_layout: vk::ImageLayout) -> vk::AttachmentDescription {
    vk::AttachmentDescription::builder()
        .format(format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(final_layout)
        .build()
}

/// Single-sample depth attachment cleared on load, contents discarded
pub fn depth_attachment_description(format: vk::Format) -> vk::AttachmentDescription {
    vk::AttachmentDescription::builder()
        .format(format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::DONT_CARE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
        .build()
}

pub fn create_render_pass(
    device: &ash::Device,
    attachments: &[vk::AttachmentDescription],
    subpasses: &[SubpassParameters],
    dependencies: &[vk::SubpassDependency],
) -> Result<vk::RenderPass> {
    if subpasses.is_empty() {
        anyhow::bail!("Render pass needs at least one subpass");
    }

    let subpass_descriptions = specify_subpass_descriptions(subpasses)?;

    let render_pass_info = vk::RenderPassCreateInfo::builder()
        .attachments(attachments)
        .subpasses(&subpass_descriptions)
        .dependencies(dependencies);

    unsafe { device.create_render_pass(&render_pass_info, None) }.context("Could not create a render pass")
}

pub fn create_framebuffer(
    device: &ash::Device,
    render_pass: vk::RenderPass,
    attachments: &[vk::ImageView],
    width: u32,
    height: u32,
    layers: u32,
) -> Result<vk::Framebuffer> {
    let framebuffer_info = vk::FramebufferCreateInfo::builder()
        .render_pass(render_pass)
        .attachments(attachments)
        .width(width)
        .height(height)
        .layers(layers);

    unsafe { device.create_framebuffer(&framebuffer_info, None) }.context("Could not create a framebuffer")
}

fn geometry_and_postprocess_subpasses() -> Vec<SubpassParameters> {
    vec![
        SubpassParameters {
            pipeline_type: vk::PipelineBindPoint::GRAPHICS,
            color_attachments: vec![vk::AttachmentReference {
                attachment: 0,
                layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            }],
            depth_stencil_attachment: Some(vk::AttachmentReference {
                attachment: 1,
                layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            }),
            ..Default::default()
        },
        SubpassParameters {
            pipeline_type: vk::PipelineBindPoint::GRAPHICS,
            input_attachments: vec![vk::AttachmentReference {
                attachment: 0,
                layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            }],
            color_attachments: vec![vk::AttachmentReference {
                attachment: 2,
                layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            }],
            ..Default::default()
        },
    ]
}

/// Render pass with a geometry subpass (color 0 + depth 1) followed by a
/// postprocess subpass that reads color 0 as an input attachment and writes
/// the presentable attachment 2.
pub fn prepare_render_pass_for_geometry_rendering_and_postprocess_subpasses(
    device: &ash::Device,
    color_format: vk::Format,
    depth_format: vk::Format,
    present_format: vk::Format,
) -> Result<vk::RenderPass> {
    let attachments = [
        vk::AttachmentDescription {
            store_op: vk::AttachmentStoreOp::DONT_CARE,
            ..color_attachment_description(color_format, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
        },
        depth_attachment_description(depth_format),
        color_attachment_description(present_format, vk::ImageLayout::PRESENT_SRC_KHR),
    ];

    let dependencies = [vk::SubpassDependency {
        src_subpass: 0,
        dst_subpass: 1,
        src_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        dst_stage_mask: vk::PipelineStageFlags::FRAGMENT_SHADER,
        src_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
        dst_access_mask: vk::AccessFlags::INPUT_ATTACHMENT_READ,
        dependency_flags: vk::DependencyFlags::BY_REGION,
    }];

    create_render_pass(device, &attachments, &geometry_and_postprocess_subpasses(), &dependencies)
}

/// Offscreen target: color image, depth image, render pass and framebuffer
pub struct ColorAndDepthTarget {
    pub color: ImageWithView,
    pub depth: ImageWithView,
    pub render_pass: vk::RenderPass,
    pub framebuffer: vk::Framebuffer,
}

impl ColorAndDepthTarget {
    pub fn destroy(&mut self, device: &ash::Device) {
        destroy_framebuffer(device, &mut self.framebuffer);
        destroy_render_pass(device, &mut self.render_pass);
        self.depth.destroy(device);
        self.color.destroy(device);
    }
}

/// The color attachment ends in SHADER_READ_ONLY_OPTIMAL so later passes can sample it.
#[allow(clippy::too_many_arguments)]
pub fn prepare_render_pass_and_framebuffer_with_color_and_depth_attachments(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: &ash::Device,
    color_format: vk::Format,
    depth_format: vk::Format,
    width: u32,
    height: u32,
) -> Result<ColorAndDepthTarget> {
    let size = vk::Extent2D { width, height };

    let mut color = create_2d_image_and_view(
        instance,
        physical_device,
        device,
        color_format,
        size,
        1,
        1,
        vk::SampleCountFlags::TYPE_1,
        vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
        vk::ImageAspectFlags::COLOR,
    )?;

    let depth = match create_2d_image_and_view(
        instance,
        physical_device,
        device,
        depth_format,
        size,
        1,
        1,
        vk::SampleCountFlags::TYPE_1,
        vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
        vk::ImageAspectFlags::DEPTH,
    ) {
        Ok(depth) => depth,
        Err(e) => {
            color.destroy(device);
            return Err(e);
        }
    };

    let attachments = [
        color_attachment_description(color_format, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL),
        vk::AttachmentDescription {
            store_op: vk::AttachmentStoreOp::STORE,
            ..depth_attachment_description(depth_format)
        },
    ];

    let subpasses = [SubpassParameters {
        pipeline_type: vk::PipelineBindPoint::GRAPHICS,
        color_attachments: vec![vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        }],
        depth_stencil_attachment: Some(vk::AttachmentReference {
            attachment: 1,
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        }),
        ..Default::default()
    }];

    let dependencies = [vk::SubpassDependency {
        src_subpass: 0,
        dst_subpass: vk::SUBPASS_EXTERNAL,
        src_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        dst_stage_mask: vk::PipelineStageFlags::FRAGMENT_SHADER,
        src_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
        dst_access_mask: vk::AccessFlags::SHADER_READ,
        dependency_flags: vk::DependencyFlags::empty(),
    }];

    let mut target = ColorAndDepthTarget {
        color,
        depth,
        render_pass: vk::RenderPass::null(),
        framebuffer: vk::Framebuffer::null(),
    };

    let result = create_render_pass(device, &attachments, &subpasses, &dependencies).and_then(|render_pass| {
        target.render_pass = render_pass;
        create_framebuffer(
            device,
            render_pass,
            &[target.color.view, target.depth.view],
            width,
            height,
            1,
        )
    });

    match result {
        Ok(framebuffer) => {
            target.framebuffer = framebuffer;
            Ok(target)
        }
        Err(e) => {
            target.destroy(device);
            Err(e)
        }
    }
}

pub fn begin_render_pass(
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    render_pass: vk::RenderPass,
    framebuffer: vk::Framebuffer,
    render_area: vk::Rect2D,
    clear_values: &[vk::ClearValue],
    contents: vk::SubpassContents,
) {
    let begin_info = vk::RenderPassBeginInfo::builder()
        .render_pass(render_pass)
        .framebuffer(framebuffer)
        .render_area(render_area)
        .clear_values(clear_values);

    unsafe { device.cmd_begin_render_pass(command_buffer, &begin_info, contents) };
}

pub fn progress_to_next_subpass(device: &ash::Device, command_buffer: vk::CommandBuffer, contents: vk::SubpassContents) {
    unsafe { device.cmd_next_subpass(command_buffer, contents) };
}

pub fn end_render_pass(device: &ash::Device, command_buffer: vk::CommandBuffer) {
    unsafe { device.cmd_end_render_pass(command_buffer) };
}

pub fn destroy_framebuffer(device: &ash::Device, framebuffer: &mut vk::Framebuffer) {
    if *framebuffer != vk::Framebuffer::null() {
        unsafe { device.destroy_framebuffer(*framebuffer, None) };
        *framebuffer = vk::Framebuffer::null();
    }
}

pub fn destroy_render_pass(device: &ash::Device, render_pass: &mut vk::RenderPass) {
    if *render_pass != vk::RenderPass::null() {
        unsafe { device.destroy_render_pass(*render_pass, None) };
        *render_pass = vk::RenderPass::null();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subpass_description_counts_and_depth() {
        let params = geometry_and_postprocess_subpasses();
        let descriptions = specify_subpass_descriptions(&params).unwrap();

        assert_eq!(descriptions.len(), 2);
        assert_eq!(descriptions[0].color_attachment_count, 1);
        assert!(!descriptions[0].p_depth_stencil_attachment.is_null());
        assert!(descriptions[0].p_resolve_attachments.is_null());
        assert_eq!(descriptions[1].input_attachment_count, 1);
        assert!(descriptions[1].p_depth_stencil_attachment.is_null());
    }

    #[test]
    fn resolve_count_must_match_color_count() {
        let params = [SubpassParameters {
            pipeline_type: vk::PipelineBindPoint::GRAPHICS,
            color_attachments: vec![vk::AttachmentReference::default(); 2],
            resolve_attachments: vec![vk::AttachmentReference::default()],
            ..Default::default()
        }];

        assert!(specify_subpass_descriptions(&params).is_err());
    }

    #[test]
    fn attachment_descriptions() {
        let color = color_attachment_description(vk::Format::B8G8R8A8_UNORM, vk::ImageLayout::PRESENT_SRC_KHR);
        assert_eq!(color.load_op, vk::AttachmentLoadOp::CLEAR);
        assert_eq!(color.store_op, vk::AttachmentStoreOp::STORE);
        assert_eq!(color.initial_layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(color.final_layout, vk::ImageLayout::PRESENT_SRC_KHR);

        let depth = depth_attachment_description(vk::Format::D32_SFLOAT);
        assert_eq!(depth.format, vk::Format::D32_SFLOAT);
        assert_eq!(depth.store_op, vk::AttachmentStoreOp::DONT_CARE);
        assert_eq!(depth.final_layout, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);
    }
}
