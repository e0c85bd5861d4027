// Synchronization recipes
//
// Fences, semaphores and queue submission. Fences synchronize GPU -> CPU,
// semaphores order batches on the GPU.

use anyhow::{Context, Result};
use ash::prelude::VkResult;
use ash::vk;

pub fn create_semaphore(device: &ash::Device) -> Result<vk::Semaphore> {
    let semaphore_info = vk::SemaphoreCreateInfo::builder();
    unsafe { device.create_semaphore(&semaphore_info, None) }.context("Could not create a semaphore")
}

pub fn create_fence(device: &ash::Device, signaled: bool) -> Result<vk::Fence> {
    let flags = if signaled {
        vk::FenceCreateFlags::SIGNALED
    } else {
        vk::FenceCreateFlags::empty()
    };
    let fence_info = vk::FenceCreateInfo::builder().flags(flags);

    unsafe { device.create_fence(&fence_info, None) }.context("Could not create a fence")
}

fn ensure_fences(fences: &[vk::Fence], action: &str) -> Result<()> {
    if fences.is_empty() {
        anyhow::bail!("No fences to {}", action);
    }
    Ok(())
}

/// TIMEOUT is an answer, not a failure
fn fence_wait_outcome(result: VkResult<()>) -> Result<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(vk::Result::TIMEOUT) => Ok(false),
        Err(e) => Err(e).context("Waiting on fence failed"),
    }
}

/// Wait for fences. Returns `false` if `timeout` (ns) elapsed first.
pub fn wait_for_fences(device: &ash::Device, fences: &[vk::Fence], wait_for_all: bool, timeout: u64) -> Result<bool> {
    ensure_fences(fences, "wait on")?;
    fence_wait_outcome(unsafe { device.wait_for_fences(fences, wait_for_all, timeout) })
}

pub fn reset_fences(device: &ash::Device, fences: &[vk::Fence]) -> Result<()> {
    ensure_fences(fences, "reset")?;

    unsafe { device.reset_fences(fences) }.context("Error occurred when tried to reset fences")
}

/// A semaphore a submission waits on, and the stage that waits
#[derive(Debug, Clone, Copy)]
pub struct WaitSemaphoreInfo {
    pub semaphore: vk::Semaphore,
    pub stage: vk::PipelineStageFlags,
}

pub fn submit_command_buffers_to_queue(
    device: &ash::Device,
    queue: vk::Queue,
    wait_semaphore_infos: &[WaitSemaphoreInfo],
    command_buffers: &[vk::CommandBuffer],
    signal_semaphores: &[vk::Semaphore],
    fence: vk::Fence,
) -> Result<()> {
    let wait_semaphores: Vec<_> = wait_semaphore_infos.iter().map(|info| info.semaphore).collect();
    let wait_stages: Vec<_> = wait_semaphore_infos.iter().map(|info| info.stage).collect();

    let submit_info = vk::SubmitInfo::builder()
        .wait_semaphores(&wait_semaphores)
        .wait_dst_stage_mask(&wait_stages)
        .command_buffers(command_buffers)
        .signal_semaphores(signal_semaphores);

    unsafe { device.queue_submit(queue, &[submit_info.build()], fence) }
        .context("Error occurred during command buffer submission")
}

/// Submit two batches where the second waits on semaphores the first signals.
#[allow(clippy::too_many_arguments)]
pub fn synchronize_two_command_buffers(
    device: &ash::Device,
    first_queue: vk::Queue,
    first_wait_semaphore_infos: &[WaitSemaphoreInfo],
    first_command_buffers: &[vk::CommandBuffer],
    synchronizing_semaphores: &[WaitSemaphoreInfo],
    second_queue: vk::Queue,
    second_command_buffers: &[vk::CommandBuffer],
    second_signal_semaphores: &[vk::Semaphore],
    second_fence: vk::Fence,
) -> Result<()> {
    let first_signal: Vec<_> = synchronizing_semaphores.iter().map(|info| info.semaphore).collect();

    submit_command_buffers_to_queue(
        device,
        first_queue,
        first_wait_semaphore_infos,
        first_command_buffers,
        &first_signal,
        vk::Fence::null(),
    )?;

    submit_command_buffers_to_queue(
        device,
        second_queue,
        synchronizing_semaphores,
        second_command_buffers,
        second_signal_semaphores,
        second_fence,
    )
}

/// Submit and block until the GPU finished the batch or `timeout` elapsed.
/// Returns `false` on timeout.
pub fn check_if_processing_of_submitted_command_buffer_has_finished(
    device: &ash::Device,
    queue: vk::Queue,
    wait_semaphore_infos: &[WaitSemaphoreInfo],
    command_buffers: &[vk::CommandBuffer],
    signal_semaphores: &[vk::Semaphore],
    timeout: u64,
) -> Result<bool> {
    let mut fence = create_fence(device, false)?;

    let result = submit_command_buffers_to_queue(
        device,
        queue,
        wait_semaphore_infos,
        command_buffers,
        signal_semaphores,
        fence,
    )
    .and_then(|()| wait_for_fences(device, &[fence], true, timeout));

    finish_processing_check(
        result,
        || wait_until_all_commands_submitted_to_queue_are_finished(device, queue),
        || destroy_fence(device, &mut fence),
    )
}

/// A timed-out fence may still be pending, so the queue is drained before
/// `release` runs. `release` runs on every path.
fn finish_processing_check(
    result: Result<bool>,
    drain: impl FnOnce() -> Result<()>,
    release: impl FnOnce(),
) -> Result<bool> {
    let drained = match &result {
        Ok(false) => drain(),
        _ => Ok(()),
    };

    release();
    drained?;
    result
}

pub fn wait_until_all_commands_submitted_to_queue_are_finished(device: &ash::Device, queue: vk::Queue) -> Result<()> {
    unsafe { device.queue_wait_idle(queue) }.context("Waiting for all operations submitted to queue failed")
}

pub fn wait_for_all_submitted_commands_to_be_finished(device: &ash::Device) -> Result<()> {
    unsafe { device.device_wait_idle() }.context("Waiting on a device failed")
}

pub fn destroy_fence(device: &ash::Device, fence: &mut vk::Fence) {
    if *fence != vk::Fence::null() {
        unsafe { device.destroy_fence(*fence, None) };
        *fence = vk::Fence::null();
    }
}

pub fn destroy_semaphore(device: &ash::Device, semaphore: &mut vk::Semaphore) {
    if *semaphore != vk::Semaphore::null() {
        unsafe { device.destroy_semaphore(*semaphore, None) };
        *semaphore = vk::Semaphore::null();
    }
}

/// Frame synchronization - one per frame in flight
pub struct FrameSync {
    pub image_acquired: vk::Semaphore,
    pub ready_to_present: vk::Semaphore,
    pub drawing_finished: vk::Fence,
}

impl FrameSync {
    pub fn new(device: &ash::Device) -> Result<Self> {
        Ok(Self {
            image_acquired: create_semaphore(device)?,
            ready_to_present: create_semaphore(device)?,
            // Start signaled so the first wait returns immediately
            drawing_finished: create_fence(device, true)?,
        })
    }

    pub fn destroy(&mut self, device: &ash::Device) {
        destroy_semaphore(device, &mut self.image_acquired);
        destroy_semaphore(device, &mut self.ready_to_present);
        destroy_fence(device, &mut self.drawing_finished);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    #[test]
    fn fence_timeout_is_not_an_error() {
        assert!(fence_wait_outcome(Ok(())).unwrap());
        assert!(!fence_wait_outcome(Err(vk::Result::TIMEOUT)).unwrap());
        assert!(fence_wait_outcome(Err(vk::Result::ERROR_DEVICE_LOST)).is_err());
    }

    #[test]
    fn processing_check_drains_only_after_timeout() {
        let mut drained = false;
        let mut released = false;
        let finished = finish_processing_check(Ok(true), || { drained = true; Ok(()) }, || released = true);
        assert!(finished.unwrap());
        assert!(!drained);
        assert!(released);

        let mut drained = false;
        let finished = finish_processing_check(Ok(false), || { drained = true; Ok(()) }, || {});
        assert!(!finished.unwrap());
        assert!(drained);
    }

    #[test]
    fn processing_check_releases_fence_when_drain_fails() {
        let mut released = false;
        let finished = finish_processing_check(
            Ok(false),
            || Err(anyhow::anyhow!("device lost")),
            || released = true,
        );
        assert!(finished.is_err());
        assert!(released);

        let mut released = false;
        let finished = finish_processing_check(Err(anyhow::anyhow!("submit failed")), || Ok(()), || released = true);
        assert!(finished.is_err());
        assert!(released);
    }

    #[test]
    fn empty_fence_lists_are_rejected() {
        assert!(ensure_fences(&[], "wait on").is_err());
        assert!(ensure_fences(&[], "reset").is_err());
        assert!(ensure_fences(&[vk::Fence::from_raw(1)], "reset").is_ok());
    }
}
