// Memory recipes
//
// Memory type selection is shared by buffers and images: the resource's
// requirements give a bitmask of acceptable memory types, the caller gives
// the property flags it needs, and the first type satisfying both wins.
//
// The gpu-allocator helpers at the bottom are the sub-allocating alternative
// to one `vkAllocateMemory` per resource.

use anyhow::{Context, Result};
use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator, AllocatorCreateDesc};
use gpu_allocator::MemoryLocation;

/// Find a memory type index allowed by `type_bits` that has all of `properties`
pub fn find_memory_type_index(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    properties: vk::MemoryPropertyFlags,
) -> Option<u32> {
    (0..memory_properties.memory_type_count).find(|&i| {
        let has_type = (type_bits & (1 << i)) != 0;
        let has_properties = memory_properties.memory_types[i as usize]
            .property_flags
            .contains(properties);
        has_type && has_properties
    })
}

fn allocate_memory_object(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: &ash::Device,
    requirements: vk::MemoryRequirements,
    properties: vk::MemoryPropertyFlags,
) -> Result<vk::DeviceMemory> {
    let memory_properties = unsafe { instance.get_physical_device_memory_properties(physical_device) };

    let memory_type_index = find_memory_type_index(&memory_properties, requirements.memory_type_bits, properties)
        .with_context(|| format!("Failed to find suitable memory type for {:?}", properties))?;

    let alloc_info = vk::MemoryAllocateInfo::builder()
        .allocation_size(requirements.size)
        .memory_type_index(memory_type_index);

    unsafe { device.allocate_memory(&alloc_info, None) }.context("Could not allocate memory object")
}

pub fn allocate_and_bind_memory_object_to_buffer(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: &ash::Device,
    buffer: vk::Buffer,
    properties: vk::MemoryPropertyFlags,
) -> Result<vk::DeviceMemory> {
    let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
    let mut memory = allocate_memory_object(instance, physical_device, device, requirements, properties)?;

    if let Err(e) = unsafe { device.bind_buffer_memory(buffer, memory, 0) } {
        free_memory_object(device, &mut memory);
        return Err(e).context("Could not bind memory object to a buffer");
    }

    Ok(memory)
}

pub fn allocate_and_bind_memory_object_to_image(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: &ash::Device,
    image: vk::Image,
    properties: vk::MemoryPropertyFlags,
) -> Result<vk::DeviceMemory> {
    let requirements = unsafe { device.get_image_memory_requirements(image) };
    let mut memory = allocate_memory_object(instance, physical_device, device, requirements, properties)?;

    if let Err(e) = unsafe { device.bind_image_memory(image, memory, 0) } {
        free_memory_object(device, &mut memory);
        return Err(e).context("Could not bind memory object to an image");
    }

    Ok(memory)
}

/// Copy `data` into host-visible memory at `offset`.
///
/// Set `flush` for memory without HOST_COHERENT so the device sees the write.
pub fn map_update_and_unmap_host_visible_memory(
    device: &ash::Device,
    memory: vk::DeviceMemory,
    offset: vk::DeviceSize,
    data: &[u8],
    flush: bool,
) -> Result<()> {
    if data.is_empty() {
        return Ok(());
    }

    unsafe {
        let ptr = device
            .map_memory(memory, offset, data.len() as vk::DeviceSize, vk::MemoryMapFlags::empty())
            .context("Could not map memory object")? as *mut u8;

        ptr.copy_from_nonoverlapping(data.as_ptr(), data.len());

        if flush {
            let range = vk::MappedMemoryRange::builder()
                .memory(memory)
                .offset(offset)
                .size(vk::WHOLE_SIZE)
                .build();
            if let Err(e) = device.flush_mapped_memory_ranges(&[range]) {
                device.unmap_memory(memory);
                return Err(e).context("Could not flush mapped memory");
            }
        }

        device.unmap_memory(memory);
    }

    Ok(())
}

pub fn free_memory_object(device: &ash::Device, memory: &mut vk::DeviceMemory) {
    if *memory != vk::DeviceMemory::null() {
        unsafe { device.free_memory(*memory, None) };
        *memory = vk::DeviceMemory::null();
    }
}

pub fn create_allocator(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: &ash::Device,
) -> Result<Allocator> {
    let allocator = Allocator::new(&AllocatorCreateDesc {
        instance: instance.clone(),
        device: device.clone(),
        physical_device,
        debug_settings: Default::default(),
        buffer_device_address: false,
        allocation_sizes: Default::default(),
    })
    .context("Could not create memory allocator")?;

    Ok(allocator)
}

/// Create a buffer whose memory is sub-allocated by `allocator`.
pub fn allocate_buffer_with_allocator(
    device: &ash::Device,
    allocator: &mut Allocator,
    name: &str,
    size: vk::DeviceSize,
    usage: vk::BufferUsageFlags,
    location: MemoryLocation,
) -> Result<(vk::Buffer, Allocation)> {
    let mut buffer = super::buffer::create_buffer(device, size, usage)?;
    let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };

    let allocation = match allocator.allocate(&AllocationCreateDesc {
        name,
        requirements,
        location,
        linear: true,
        allocation_scheme: AllocationScheme::GpuAllocatorManaged,
    }) {
        Ok(allocation) => allocation,
        Err(e) => {
            super::buffer::destroy_buffer(device, &mut buffer);
            return Err(e).with_context(|| format!("Could not allocate memory for buffer '{}'", name));
        }
    };

    if let Err(e) = unsafe { device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) } {
        let _ = allocator.free(allocation);
        super::buffer::destroy_buffer(device, &mut buffer);
        return Err(e).context("Could not bind allocation to buffer");
    }

    Ok((buffer, allocation))
}

pub fn free_buffer_allocation(
    device: &ash::Device,
    allocator: &mut Allocator,
    buffer: &mut vk::Buffer,
    allocation: Allocation,
) -> Result<()> {
    super::buffer::destroy_buffer(device, buffer);
    allocator.free(allocation).context("Could not free buffer allocation")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_properties(types: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: types.len() as u32,
            ..Default::default()
        };
        for (slot, &flags) in props.memory_types.iter_mut().zip(types) {
            slot.property_flags = flags;
        }
        props
    }

    #[test]
    fn picks_first_type_with_allowed_bit_and_flags() {
        let host = vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
        let props = memory_properties(&[vk::MemoryPropertyFlags::DEVICE_LOCAL, host, host]);

        assert_eq!(find_memory_type_index(&props, 0b111, host), Some(1));
        assert_eq!(find_memory_type_index(&props, 0b100, host), Some(2));
        assert_eq!(
            find_memory_type_index(&props, 0b111, vk::MemoryPropertyFlags::DEVICE_LOCAL),
            Some(0)
        );
    }

    #[test]
    fn properties_are_a_subset_match() {
        let props = memory_properties(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL | vk::MemoryPropertyFlags::HOST_VISIBLE,
        ]);

        assert_eq!(find_memory_type_index(&props, 1, vk::MemoryPropertyFlags::HOST_VISIBLE), Some(0));
        assert_eq!(find_memory_type_index(&props, 1, vk::MemoryPropertyFlags::empty()), Some(0));
    }

    #[test]
    fn no_match_when_mask_excludes_candidates() {
        let props = memory_properties(&[vk::MemoryPropertyFlags::HOST_VISIBLE, vk::MemoryPropertyFlags::DEVICE_LOCAL]);

        assert_eq!(find_memory_type_index(&props, 0b10, vk::MemoryPropertyFlags::HOST_VISIBLE), None);
        assert_eq!(find_memory_type_index(&props, 0, vk::MemoryPropertyFlags::empty()), None);
    }

    #[test]
    fn types_beyond_count_are_ignored() {
        let mut props = memory_properties(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]);
        props.memory_types[1].property_flags = vk::MemoryPropertyFlags::HOST_VISIBLE;

        assert_eq!(find_memory_type_index(&props, u32::MAX, vk::MemoryPropertyFlags::HOST_VISIBLE), None);
    }
}
