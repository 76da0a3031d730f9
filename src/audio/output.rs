use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use ringbuf::traits::{Consumer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::sync::mpsc;
use tracing::{error, info};

/// Keeps a device output stream alive on its own thread.
///
/// The cpal stream lives on the thread that built it; dropping this handle
/// ends that thread and closes the device.
pub struct AudioOutput {
    _stop: mpsc::Sender<()>,
    pub sample_rate: u32,
}

impl AudioOutput {
    /// Open the default output device at `sample_rate` and return the
    /// producer side of a ring holding `buffer_seconds` of mono audio.
    pub fn spawn(sample_rate: u32, buffer_seconds: f32) -> Result<(Self, HeapProd<f32>), anyhow::Error> {
        let capacity = ((sample_rate as f32 * buffer_seconds) as usize).max(1024);
        let (producer, consumer) = HeapRb::<f32>::new(capacity).split();

        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), String>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        std::thread::spawn(move || {
            let stream = match build_stream(sample_rate, consumer) {
                Ok(stream) => {
                    let _ = ready_tx.send(Ok(()));
                    stream
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e.to_string()));
                    return;
                }
            };
            // Blocks until the handle is dropped.
            let _ = stop_rx.recv();
            drop(stream);
        });

        ready_rx
            .recv()
            .map_err(|_| anyhow::anyhow!("output thread exited"))?
            .map_err(|e| anyhow::anyhow!(e))?;

        Ok((
            Self {
                _stop: stop_tx,
                sample_rate,
            },
            producer,
        ))
    }
}

fn build_stream(sample_rate: u32, mut consumer: HeapCons<f32>) -> Result<cpal::Stream, anyhow::Error> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| anyhow::anyhow!("No output device available"))?;
    info!("Audio Output Device: {}", device.name().unwrap_or_default());

    let config = device
        .supported_output_configs()?
        .find(|range| {
            range.sample_format() == cpal::SampleFormat::F32
                && range.min_sample_rate().0 <= sample_rate
                && range.max_sample_rate().0 >= sample_rate
        })
        .ok_or_else(|| anyhow::anyhow!("Output device cannot play f32 at {}Hz", sample_rate))?
        .with_sample_rate(cpal::SampleRate(sample_rate));
    let channels = config.channels() as usize;
    info!("Audio Output Config: Rate={}Hz, Channels={}", sample_rate, channels);

    let err_fn = |err| error!("an error occurred on output stream: {}", err);
    let stream = device.build_output_stream(
        &config.into(),
        move |data: &mut [f32], _: &_| write_output_data(data, channels, &mut consumer),
        err_fn,
        None,
    )?;
    stream.play()?;
    Ok(stream)
}

fn write_output_data<C>(output: &mut [f32], channels: usize, consumer: &mut C)
where
    C: Consumer<Item = f32>,
{
    // Mono ring duplicated across device channels; silence on underrun.
    for frame in output.chunks_mut(channels.max(1)) {
        let sample = consumer.try_pop().unwrap_or(0.0);
        for slot in frame.iter_mut() {
            *slot = sample;
        }
    }
}
