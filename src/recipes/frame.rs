// Frame recipes
//
// One frame of animation: acquire a swapchain image, build a framebuffer
// for it, record, submit and present. Several `FrameResources` rotated in
// turn let the CPU prepare a frame while the GPU is still drawing earlier ones.

use anyhow::Result;
use ash::extensions::khr;
use ash::vk;

use super::image::ImageWithView;
use super::render_pass::{create_framebuffer, destroy_framebuffer};
use super::swapchain::{acquire_swapchain_image, present_image, PresentInfo};
use super::sync::{reset_fences, submit_command_buffers_to_queue, wait_for_fences, FrameSync, WaitSemaphoreInfo};

/// Everything one in-flight frame owns
pub struct FrameResources {
    pub command_buffer: vk::CommandBuffer,
    pub sync: FrameSync,
    pub depth_attachment: Option<ImageWithView>,
    pub framebuffer: vk::Framebuffer,
}

impl FrameResources {
    /// `command_buffer` stays owned by its pool; its fence starts signaled.
    pub fn new(
        device: &ash::Device,
        command_buffer: vk::CommandBuffer,
        depth_attachment: Option<ImageWithView>,
    ) -> Result<Self> {
        Ok(Self {
            command_buffer,
            sync: FrameSync::new(device)?,
            depth_attachment,
            framebuffer: vk::Framebuffer::null(),
        })
    }

    pub fn destroy(&mut self, device: &ash::Device) {
        destroy_framebuffer(device, &mut self.framebuffer);
        if let Some(depth) = self.depth_attachment.as_mut() {
            depth.destroy(device);
        }
        self.depth_attachment = None;
        self.sync.destroy(device);
    }
}

/// Swapchain and queues shared by every frame
#[derive(Clone, Copy)]
pub struct FrameTarget<'a> {
    pub swapchain_loader: &'a khr::Swapchain,
    pub swapchain: vk::SwapchainKHR,
    pub swapchain_size: vk::Extent2D,
    pub swapchain_image_views: &'a [vk::ImageView],
    pub render_pass: vk::RenderPass,
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
}

/// Caller-provided waits plus the acquisition semaphore, waited on at the
/// color attachment output stage.
fn frame_wait_semaphores(extra: &[WaitSemaphoreInfo], image_acquired: vk::Semaphore) -> Vec<WaitSemaphoreInfo> {
    let mut waits = extra.to_vec();
    waits.push(WaitSemaphoreInfo {
        semaphore: image_acquired,
        stage: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
    });
    waits
}

/// Render one frame with `record` filling the command buffer.
///
/// `record` receives the command buffer, the acquired image index and the
/// framebuffer built for that image. Returns `true` when the swapchain is
/// out of date or suboptimal and should be recreated. If recording or
/// submission fails the frame stays reusable, but the acquired image is never
/// presented, so recreate the swapchain before rendering again.
pub fn prepare_single_frame_of_animation<F>(
    device: &ash::Device,
    target: &FrameTarget<'_>,
    frame: &mut FrameResources,
    wait_infos: &[WaitSemaphoreInfo],
    record: F,
) -> Result<bool>
where
    F: FnOnce(vk::CommandBuffer, u32, vk::Framebuffer) -> Result<()>,
{
    let acquired = match acquire_swapchain_image(
        target.swapchain_loader,
        target.swapchain,
        frame.sync.image_acquired,
        vk::Fence::null(),
        u64::MAX,
    )? {
        Some(acquired) => acquired,
        None => return Ok(true),
    };

    let submitted = (|| -> Result<()> {
        let color_view = *target
            .swapchain_image_views
            .get(acquired.index as usize)
            .ok_or_else(|| anyhow::anyhow!("Swapchain image index {} has no view", acquired.index))?;

        let mut attachments = vec![color_view];
        if let Some(depth) = &frame.depth_attachment {
            attachments.push(depth.view);
        }

        destroy_framebuffer(device, &mut frame.framebuffer);
        frame.framebuffer = create_framebuffer(
            device,
            target.render_pass,
            &attachments,
            target.swapchain_size.width,
            target.swapchain_size.height,
            1,
        )?;

        record(frame.command_buffer, acquired.index, frame.framebuffer)?;

        // Only reset once submission is certain, or the next wait never returns
        reset_fences(device, &[frame.sync.drawing_finished])?;

        submit_command_buffers_to_queue(
            device,
            target.graphics_queue,
            &frame_wait_semaphores(wait_infos, frame.sync.image_acquired),
            &[frame.command_buffer],
            &[frame.sync.ready_to_present],
            frame.sync.drawing_finished,
        )
    })();

    release_on_error(submitted, || {
        release_acquisition(device, target.graphics_queue, &frame.sync)
    })?;

    let recreate = present_image(
        target.swapchain_loader,
        target.present_queue,
        &[frame.sync.ready_to_present],
        &[PresentInfo {
            swapchain: target.swapchain,
            image_index: acquired.index,
        }],
    )?;

    Ok(recreate || acquired.suboptimal)
}

/// An empty batch that consumes the pending acquisition signal and leaves
/// the frame fence signaled again, so the frame can be reused after a failed
/// record or submit. The acquired image itself stays unpresented.
fn release_acquisition(device: &ash::Device, queue: vk::Queue, sync: &FrameSync) -> Result<()> {
    reset_fences(device, &[sync.drawing_finished])?;
    submit_command_buffers_to_queue(
        device,
        queue,
        &[WaitSemaphoreInfo {
            semaphore: sync.image_acquired,
            stage: vk::PipelineStageFlags::ALL_COMMANDS,
        }],
        &[],
        &[],
        sync.drawing_finished,
    )
}

/// On failure run `release`; its own error is logged and the original kept
fn release_on_error<T>(result: Result<T>, release: impl FnOnce() -> Result<()>) -> Result<T> {
    if result.is_err() {
        if let Err(e) = release() {
            log::error!("Could not release frame after failure: {:#}", e);
        }
    }
    result
}

pub fn next_frame_index(current: usize, frame_count: usize) -> usize {
    if frame_count == 0 {
        0
    } else {
        (current + 1) % frame_count
    }
}

/// Render with the next of several frame resources, waiting only for that
/// frame's previous submission to finish.
pub fn increase_performance_through_increasing_the_number_of_separately_rendered_frames<F>(
    device: &ash::Device,
    target: &FrameTarget<'_>,
    frames: &mut [FrameResources],
    next_frame: &mut usize,
    wait_infos: &[WaitSemaphoreInfo],
    record: F,
) -> Result<bool>
where
    F: FnOnce(vk::CommandBuffer, u32, vk::Framebuffer) -> Result<()>,
{
    let frame_count = frames.len();
    let frame = frames
        .get_mut(*next_frame)
        .ok_or_else(|| anyhow::anyhow!("Frame index {} out of {} frames", *next_frame, frame_count))?;

    if !wait_for_fences(device, &[frame.sync.drawing_finished], false, u64::MAX)? {
        anyhow::bail!("Timed out waiting for frame {}", *next_frame);
    }

    let recreate = prepare_single_frame_of_animation(device, target, frame, wait_infos, record)?;
    *next_frame = next_frame_index(*next_frame, frame_count);
    Ok(recreate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    #[test]
    fn frame_index_wraps() {
        assert_eq!(next_frame_index(0, 3), 1);
        assert_eq!(next_frame_index(2, 3), 0);
        assert_eq!(next_frame_index(0, 1), 0);
        assert_eq!(next_frame_index(5, 0), 0);
    }

    #[test]
    fn failed_frame_is_released_and_keeps_its_error() {
        let mut released = false;
        let result: Result<()> = release_on_error(Err(anyhow::anyhow!("record failed")), || {
            released = true;
            Ok(())
        });
        assert!(released);
        assert_eq!(result.unwrap_err().to_string(), "record failed");

        let result: Result<()> = release_on_error(Err(anyhow::anyhow!("submit failed")), || {
            Err(anyhow::anyhow!("queue lost"))
        });
        assert_eq!(result.unwrap_err().to_string(), "submit failed");

        let mut released = false;
        assert_eq!(release_on_error(Ok(7), || { released = true; Ok(()) }).unwrap(), 7);
        assert!(!released);
    }

    #[test]
    fn acquisition_semaphore_is_waited_last() {
        let extra = [WaitSemaphoreInfo {
            semaphore: vk::Semaphore::from_raw(1),
            stage: vk::PipelineStageFlags::VERTEX_INPUT,
        }];

        let waits = frame_wait_semaphores(&extra, vk::Semaphore::from_raw(2));
        assert_eq!(waits.len(), 2);
        assert_eq!(waits[0].semaphore, vk::Semaphore::from_raw(1));
        assert_eq!(waits[1].semaphore, vk::Semaphore::from_raw(2));
        assert_eq!(waits[1].stage, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT);
    }
}
