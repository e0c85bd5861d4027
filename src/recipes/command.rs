// Command buffer recipes
//
// Pools, allocation, recording boundaries and secondary command buffers.

use anyhow::{Context, Result};
use ash::vk;

pub fn create_command_pool(
    device: &ash::Device,
    flags: vk::CommandPoolCreateFlags,
    queue_family: u32,
) -> Result<vk::CommandPool> {
    let pool_info = vk::CommandPoolCreateInfo::builder()
        .queue_family_index(queue_family)
        .flags(flags);

    unsafe { device.create_command_pool(&pool_info, None) }.context("Could not create command pool")
}

pub fn allocate_command_buffers(
    device: &ash::Device,
    pool: vk::CommandPool,
    level: vk::CommandBufferLevel,
    count: u32,
) -> Result<Vec<vk::CommandBuffer>> {
    if count == 0 {
        anyhow::bail!("Requested zero command buffers");
    }

    let alloc_info = vk::CommandBufferAllocateInfo::builder()
        .command_pool(pool)
        .level(level)
        .command_buffer_count(count);

    unsafe { device.allocate_command_buffers(&alloc_info) }.context("Could not allocate command buffers")
}

/// Render pass state a secondary command buffer continues from
#[derive(Debug, Clone, Copy)]
pub struct SecondaryInheritance {
    pub render_pass: vk::RenderPass,
    pub subpass: u32,
    pub framebuffer: vk::Framebuffer,
}

pub fn begin_command_buffer_recording(
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    usage: vk::CommandBufferUsageFlags,
    inheritance: Option<SecondaryInheritance>,
) -> Result<()> {
    let inheritance_info = inheritance.map(|inh| {
        vk::CommandBufferInheritanceInfo::builder()
            .render_pass(inh.render_pass)
            .subpass(inh.subpass)
            .framebuffer(inh.framebuffer)
            .build()
    });

    let mut begin_info = vk::CommandBufferBeginInfo::builder().flags(usage);
    if let Some(ref info) = inheritance_info {
        begin_info = begin_info.inheritance_info(info);
    }

    unsafe { device.begin_command_buffer(command_buffer, &begin_info) }
        .context("Could not begin command buffer recording operation")
}

pub fn end_command_buffer_recording(device: &ash::Device, command_buffer: vk::CommandBuffer) -> Result<()> {
    unsafe { device.end_command_buffer(command_buffer) }
        .context("Error occurred during command buffer recording")
}

/// Requires a pool created with RESET_COMMAND_BUFFER.
pub fn reset_command_buffer(
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    release_resources: bool,
) -> Result<()> {
    let flags = if release_resources {
        vk::CommandBufferResetFlags::RELEASE_RESOURCES
    } else {
        vk::CommandBufferResetFlags::empty()
    };

    unsafe { device.reset_command_buffer(command_buffer, flags) }
        .context("Error occurred during command buffer reset")
}

pub fn reset_command_pool(device: &ash::Device, pool: vk::CommandPool, release_resources: bool) -> Result<()> {
    let flags = if release_resources {
        vk::CommandPoolResetFlags::RELEASE_RESOURCES
    } else {
        vk::CommandPoolResetFlags::empty()
    };

    unsafe { device.reset_command_pool(pool, flags) }.context("Error occurred during command pool reset")
}

/// Record `secondaries` into `primary`. The primary must be inside a render
/// pass begun with SECONDARY_COMMAND_BUFFERS contents, or outside any pass.
pub fn execute_secondary_command_buffers_inside_primary(
    device: &ash::Device,
    primary: vk::CommandBuffer,
    secondaries: &[vk::CommandBuffer],
) {
    if secondaries.is_empty() {
        return;
    }
    unsafe { device.cmd_execute_commands(primary, secondaries) };
}

pub fn free_command_buffers(device: &ash::Device, pool: vk::CommandPool, command_buffers: &mut Vec<vk::CommandBuffer>) {
    if !command_buffers.is_empty() {
        unsafe { device.free_command_buffers(pool, command_buffers.as_slice()) };
        command_buffers.clear();
    }
}

/// Destroying a pool frees every command buffer allocated from it.
pub fn destroy_command_pool(device: &ash::Device, pool: &mut vk::CommandPool) {
    if *pool != vk::CommandPool::null() {
        unsafe { device.destroy_command_pool(*pool, None) };
        *pool = vk::CommandPool::null();
    }
}
