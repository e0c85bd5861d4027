// Buffer recipes
//
// Creation, views, barriers, copies and staging uploads for buffers.

use anyhow::{Context, Result};
use ash::vk;

use super::command::{begin_command_buffer_recording, end_command_buffer_recording};
use super::memory::{
    allocate_and_bind_memory_object_to_buffer, free_memory_object, map_update_and_unmap_host_visible_memory,
};
use super::sync::{create_fence, destroy_fence, submit_command_buffers_to_queue, wait_for_fences, WaitSemaphoreInfo};

pub fn create_buffer(device: &ash::Device, size: vk::DeviceSize, usage: vk::BufferUsageFlags) -> Result<vk::Buffer> {
    if size == 0 {
        anyhow::bail!("Buffer size must be greater than zero");
    }

    let buffer_info = vk::BufferCreateInfo::builder()
        .size(size)
        .usage(usage)
        .sharing_mode(vk::SharingMode::EXCLUSIVE);

    unsafe { device.create_buffer(&buffer_info, None) }.context("Could not create a buffer")
}

/// Buffer plus its dedicated memory object
#[derive(Debug, Clone, Copy)]
pub struct BufferWithMemory {
    pub buffer: vk::Buffer,
    pub memory: vk::DeviceMemory,
    pub size: vk::DeviceSize,
}

impl BufferWithMemory {
    pub fn destroy(&mut self, device: &ash::Device) {
        destroy_buffer(device, &mut self.buffer);
        free_memory_object(device, &mut self.memory);
    }
}

/// Create a buffer and bind a fresh memory object with `properties` to it
pub fn create_buffer_with_memory(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: &ash::Device,
    size: vk::DeviceSize,
    usage: vk::BufferUsageFlags,
    properties: vk::MemoryPropertyFlags,
) -> Result<BufferWithMemory> {
    let mut buffer = create_buffer(device, size, usage)?;
    let memory = match allocate_and_bind_memory_object_to_buffer(instance, physical_device, device, buffer, properties) {
        Ok(memory) => memory,
        Err(e) => {
            destroy_buffer(device, &mut buffer);
            return Err(e);
        }
    };

    Ok(BufferWithMemory { buffer, memory, size })
}

/// Host-visible, coherent buffer filled with `data`
pub fn create_buffer_with_data<T: bytemuck::Pod>(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: &ash::Device,
    usage: vk::BufferUsageFlags,
    data: &[T],
) -> Result<BufferWithMemory> {
    let bytes: &[u8] = bytemuck::cast_slice(data);

    let mut buffer = create_buffer_with_memory(
        instance,
        physical_device,
        device,
        bytes.len() as vk::DeviceSize,
        usage,
        vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
    )?;

    if let Err(e) = map_update_and_unmap_host_visible_memory(device, buffer.memory, 0, bytes, false) {
        buffer.destroy(device);
        return Err(e);
    }

    Ok(buffer)
}

/// Access and ownership change for one buffer
#[derive(Debug, Clone, Copy)]
pub struct BufferTransition {
    pub buffer: vk::Buffer,
    pub current_access: vk::AccessFlags,
    pub new_access: vk::AccessFlags,
    pub current_queue_family: u32,
    pub new_queue_family: u32,
}

impl BufferTransition {
    /// Access change without queue family ownership transfer
    pub fn new(buffer: vk::Buffer, current_access: vk::AccessFlags, new_access: vk::AccessFlags) -> Self {
        Self {
            buffer,
            current_access,
            new_access,
            current_queue_family: vk::QUEUE_FAMILY_IGNORED,
            new_queue_family: vk::QUEUE_FAMILY_IGNORED,
        }
    }
}

pub fn buffer_memory_barriers(transitions: &[BufferTransition]) -> Vec<vk::BufferMemoryBarrier> {
    transitions
        .iter()
        .map(|t| {
            vk::BufferMemoryBarrier::builder()
                .src_access_mask(t.current_access)
                .dst_access_mask(t.new_access)
                .src_queue_family_index(t.current_queue_family)
                .dst_queue_family_index(t.new_queue_family)
                .buffer(t.buffer)
                .offset(0)
                .size(vk::WHOLE_SIZE)
                .build()
        })
        .collect()
}

pub fn set_buffer_memory_barrier(
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    generating_stages: vk::PipelineStageFlags,
    consuming_stages: vk::PipelineStageFlags,
    transitions: &[BufferTransition],
) {
    if transitions.is_empty() {
        return;
    }

    let barriers = buffer_memory_barriers(transitions);
    unsafe {
        device.cmd_pipeline_barrier(
            command_buffer,
            generating_stages,
            consuming_stages,
            vk::DependencyFlags::empty(),
            &[],
            &barriers,
            &[],
        );
    }
}

/// Texel view over a buffer created with a TEXEL_BUFFER usage
pub fn create_buffer_view(
    device: &ash::Device,
    buffer: vk::Buffer,
    format: vk::Format,
    offset: vk::DeviceSize,
    range: vk::DeviceSize,
) -> Result<vk::BufferView> {
    let view_info = vk::BufferViewCreateInfo::builder()
        .buffer(buffer)
        .format(format)
        .offset(offset)
        .range(range);

    unsafe { device.create_buffer_view(&view_info, None) }.context("Could not create buffer view")
}

pub fn copy_data_between_buffers(
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    source: vk::Buffer,
    destination: vk::Buffer,
    regions: &[vk::BufferCopy],
) {
    if regions.is_empty() {
        return;
    }
    unsafe { device.cmd_copy_buffer(command_buffer, source, destination, regions) };
}

/// Upload `data` into device-local `destination` through a temporary staging
/// buffer, then make it visible to `destination_consuming_stages`.
///
/// Blocks until the copy has finished.
#[allow(clippy::too_many_arguments)]
pub fn use_staging_buffer_to_update_buffer_with_device_local_memory_bound(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: &ash::Device,
    data: &[u8],
    destination: vk::Buffer,
    destination_offset: vk::DeviceSize,
    destination_current_access: vk::AccessFlags,
    destination_new_access: vk::AccessFlags,
    destination_generating_stages: vk::PipelineStageFlags,
    destination_consuming_stages: vk::PipelineStageFlags,
    queue: vk::Queue,
    command_buffer: vk::CommandBuffer,
    signal_semaphores: &[vk::Semaphore],
) -> Result<()> {
    let mut staging = create_buffer_with_data(instance, physical_device, device, vk::BufferUsageFlags::TRANSFER_SRC, data)?;

    let result = (|| {
        begin_command_buffer_recording(device, command_buffer, vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT, None)?;

        set_buffer_memory_barrier(
            device,
            command_buffer,
            destination_generating_stages,
            vk::PipelineStageFlags::TRANSFER,
            &[BufferTransition::new(destination, destination_current_access, vk::AccessFlags::TRANSFER_WRITE)],
        );

        copy_data_between_buffers(
            device,
            command_buffer,
            staging.buffer,
            destination,
            &[vk::BufferCopy {
                src_offset: 0,
                dst_offset: destination_offset,
                size: data.len() as vk::DeviceSize,
            }],
        );

        set_buffer_memory_barrier(
            device,
            command_buffer,
            vk::PipelineStageFlags::TRANSFER,
            destination_consuming_stages,
            &[BufferTransition::new(destination, vk::AccessFlags::TRANSFER_WRITE, destination_new_access)],
        );

        end_command_buffer_recording(device, command_buffer)?;

        submit_and_wait(device, queue, command_buffer, signal_semaphores)
    })();

    staging.destroy(device);
    result
}

/// Submit one command buffer and wait for it on a temporary fence
pub(crate) fn submit_and_wait(
    device: &ash::Device,
    queue: vk::Queue,
    command_buffer: vk::CommandBuffer,
    signal_semaphores: &[vk::Semaphore],
) -> Result<()> {
    let mut fence = create_fence(device, false)?;
    let no_waits: [WaitSemaphoreInfo; 0] = [];

    let result = submit_command_buffers_to_queue(device, queue, &no_waits, &[command_buffer], signal_semaphores, fence)
        .and_then(|()| wait_for_fences(device, &[fence], true, u64::MAX))
        .and_then(|finished| {
            if finished {
                Ok(())
            } else {
                anyhow::bail!("Timed out waiting for upload")
            }
        });

    destroy_fence(device, &mut fence);
    result
}

pub fn destroy_buffer_view(device: &ash::Device, view: &mut vk::BufferView) {
    if *view != vk::BufferView::null() {
        unsafe { device.destroy_buffer_view(*view, None) };
        *view = vk::BufferView::null();
    }
}

pub fn destroy_buffer(device: &ash::Device, buffer: &mut vk::Buffer) {
    if *buffer != vk::Buffer::null() {
        unsafe { device.destroy_buffer(*buffer, None) };
        *buffer = vk::Buffer::null();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    #[test]
    fn barriers_cover_whole_buffer() {
        let buffer = vk::Buffer::from_raw(7);
        let barriers = buffer_memory_barriers(&[BufferTransition::new(
            buffer,
            vk::AccessFlags::TRANSFER_WRITE,
            vk::AccessFlags::VERTEX_ATTRIBUTE_READ,
        )]);

        assert_eq!(barriers.len(), 1);
        let barrier = &barriers[0];
        assert_eq!(barrier.buffer, buffer);
        assert_eq!(barrier.offset, 0);
        assert_eq!(barrier.size, vk::WHOLE_SIZE);
        assert_eq!(barrier.src_access_mask, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(barrier.dst_access_mask, vk::AccessFlags::VERTEX_ATTRIBUTE_READ);
        assert_eq!(barrier.src_queue_family_index, vk::QUEUE_FAMILY_IGNORED);
        assert_eq!(barrier.dst_queue_family_index, vk::QUEUE_FAMILY_IGNORED);
    }

    #[test]
    fn ownership_transfer_keeps_family_indices() {
        let transition = BufferTransition {
            current_queue_family: 0,
            new_queue_family: 2,
            ..BufferTransition::new(vk::Buffer::null(), vk::AccessFlags::SHADER_WRITE, vk::AccessFlags::SHADER_READ)
        };
        let barriers = buffer_memory_barriers(&[transition]);

        assert_eq!(barriers[0].src_queue_family_index, 0);
        assert_eq!(barriers[0].dst_queue_family_index, 2);
    }
}
