//! End-to-end tests for the dispatcher and its background worker.
//!
//! Most tests run the real spectrogram engine. The correlation, teardown
//! and crash tests swap in small scripted backends so the worker's
//! behaviour is deterministic.

use std::f32::consts::PI;
use std::time::Duration;

use crossbeam_channel::unbounded;
use spectrogram_worker::spectrum::ProgressEvent;
use spectrogram_worker::worker::engine::process_request;
use spectrogram_worker::worker::{AudioData, JobType, Request, Response};
use spectrogram_worker::{
    AudioInput, Dispatcher, DispatcherConfig, JobError, SpectrogramOptions, WindowType,
};

fn tone(n_samples: usize, freq_hz: f32) -> Vec<f32> {
    (0..n_samples)
        .map(|i| 0.5 * (2.0 * PI * freq_hz * i as f32 / 44100.0).sin())
        .collect()
}

fn small_options() -> SpectrogramOptions {
    SpectrogramOptions {
        fft_size: 256,
        hop_size: 8,
        window_function: WindowType::Hamming,
        sample_rate: 44100.0,
    }
}

#[test]
fn spectrogram_with_progress() {
    let mut dispatcher = Dispatcher::new().unwrap();

    let (progress_tx, progress_rx) = unbounded();
    dispatcher.set_progress_callback(move |event: ProgressEvent| {
        let _ = progress_tx.send(event);
    });

    // 251 frames: progress on 0, 100, 200
    let audio = AudioInput::Stereo(tone(256 + 8 * 250, 440.0), tone(256 + 8 * 250, 880.0));
    let result = dispatcher
        .generate_spectrogram(audio, small_options())
        .wait()
        .unwrap();

    assert_eq!(result.metadata.num_frames, 251);
    assert_eq!(result.metadata.freq_bins, 128);
    assert_eq!(result.spectrogram_data.num_frames(), 251);

    let events: Vec<ProgressEvent> = progress_rx.try_iter().collect();
    let currents: Vec<usize> = events.iter().map(|e| e.current).collect();
    assert_eq!(currents, vec![0, 100, 200]);
    assert!(events.iter().all(|e| e.total == 251));
}

#[test]
fn default_options_match_direct_assembly() {
    let mut dispatcher = Dispatcher::new().unwrap();
    let audio = AudioInput::Mono(tone(4096, 1000.0));

    let via_worker = dispatcher
        .generate_spectrogram(audio.clone(), SpectrogramOptions::default())
        .wait()
        .unwrap();
    let direct =
        spectrogram_worker::spectrum::generate_spectrogram(&audio, &SpectrogramOptions::default())
            .unwrap();

    assert_eq!(via_worker, direct);
    assert_eq!(via_worker.metadata.num_frames, 5);
}

#[test]
fn empty_input_rejected_and_worker_survives() {
    let mut dispatcher = Dispatcher::new().unwrap();

    let bad = dispatcher.generate_spectrogram(AudioInput::Mono(Vec::new()), small_options());
    let good = dispatcher.generate_spectrogram(AudioInput::Mono(tone(1024, 440.0)), small_options());

    assert_eq!(
        bad.wait(),
        Err(JobError::Failed("No audio data provided".to_string()))
    );
    assert!(good.wait().is_ok());
}

#[test]
fn unknown_job_type_rejected() {
    let mut dispatcher = Dispatcher::new().unwrap();

    let handle = dispatcher.submit(
        JobType::Other("computeChroma".to_string()),
        Some(AudioData::Samples(vec![0.0; 512])),
        SpectrogramOptions::default(),
    );
    assert_eq!(
        handle.wait(),
        Err(JobError::Failed(
            "Unknown worker message type: computeChroma".to_string()
        ))
    );

    let next = dispatcher.generate_spectrogram(AudioInput::Mono(tone(512, 440.0)), small_options());
    assert!(next.wait().is_ok());
}

#[test]
fn invalid_fft_size_rejected() {
    let mut dispatcher = Dispatcher::new().unwrap();
    let options = SpectrogramOptions {
        fft_size: 1000,
        ..Default::default()
    };

    match dispatcher
        .generate_spectrogram(AudioInput::Mono(tone(4096, 440.0)), options)
        .wait()
    {
        Err(JobError::Failed(message)) => assert!(message.contains("power of two")),
        other => panic!("expected failure, got {:?}", other),
    }
}

#[test]
fn oversized_fft_size_settles_without_losing_worker() {
    let mut dispatcher = Dispatcher::new().unwrap();
    let options = SpectrogramOptions {
        fft_size: 1 << 61,
        ..Default::default()
    };

    let oversized = dispatcher.generate_spectrogram(AudioInput::Mono(vec![0.1; 16]), options);
    let next = dispatcher.generate_spectrogram(
        AudioInput::Mono(tone(4096, 440.0)),
        SpectrogramOptions::default(),
    );

    let result = oversized.wait().unwrap();
    assert!(result.spectrogram_data.is_empty());
    assert_eq!(result.metadata.num_frames, 0);

    assert_eq!(next.wait().unwrap().metadata.num_frames, 5);
}

#[test]
fn queued_jobs_resolve_independently() {
    let mut dispatcher = Dispatcher::new().unwrap();

    let handles: Vec<_> = [1024usize, 2048, 4096]
        .iter()
        .map(|&len| {
            let options = SpectrogramOptions {
                fft_size: 512,
                hop_size: 512,
                ..Default::default()
            };
            dispatcher.generate_spectrogram(AudioInput::Mono(tone(len, 440.0)), options)
        })
        .collect();

    let frames: Vec<usize> = handles
        .into_iter()
        .map(|h| h.wait().unwrap().metadata.num_frames)
        .collect();
    assert_eq!(frames, vec![2, 4, 8]);
}

#[test]
fn responses_out_of_order_reach_their_jobs() {
    // Holds two requests, then answers the second one first
    let backend = |requests: crossbeam_channel::Receiver<Request>,
                   responses: crossbeam_channel::Sender<Response>| {
        let first = requests.recv().unwrap();
        let second = requests.recv().unwrap();
        for request in [second, first] {
            let response = process_request(request, &mut |_| {});
            responses.send(response).unwrap();
        }
        for _ in requests.iter() {}
    };
    let mut dispatcher = Dispatcher::with_backend(DispatcherConfig::default(), backend).unwrap();

    let options = SpectrogramOptions {
        fft_size: 256,
        hop_size: 256,
        ..Default::default()
    };
    let a = dispatcher.generate_spectrogram(AudioInput::Mono(tone(1024, 440.0)), options.clone());
    let b = dispatcher.generate_spectrogram(AudioInput::Mono(tone(2048, 440.0)), options);
    assert_eq!((a.id(), b.id()), (1, 2));

    // B settles first
    let b_result = b.wait().unwrap();
    let a_result = a.wait().unwrap();
    assert_eq!(a_result.metadata.num_frames, 4);
    assert_eq!(b_result.metadata.num_frames, 8);
}

#[test]
fn terminate_rejects_pending_jobs() {
    // Accepts requests and never answers
    let mut dispatcher =
        Dispatcher::with_backend(DispatcherConfig::default(), |requests, _responses| {
            for _ in requests.iter() {}
        })
        .unwrap();

    let mut a = dispatcher.generate_spectrogram(AudioInput::Mono(vec![0.0; 8]), Default::default());
    let b = dispatcher.generate_spectrogram(AudioInput::Mono(vec![0.0; 8]), Default::default());
    assert!(a.wait_timeout(Duration::from_millis(20)).is_none());

    assert_eq!(dispatcher.terminate(), 2);
    assert_eq!(a.wait(), Err(JobError::Terminated));
    assert_eq!(b.wait(), Err(JobError::Terminated));

    let mut late = dispatcher.generate_spectrogram(AudioInput::Mono(vec![0.0; 8]), Default::default());
    assert_eq!(late.try_result(), Some(Err(JobError::Terminated)));
    assert_eq!(late.try_result(), Some(Err(JobError::Terminated)));
}

#[test]
fn worker_crash_fails_pending_and_later_jobs() {
    let mut dispatcher =
        Dispatcher::with_backend(DispatcherConfig::default(), |requests, _responses| {
            let _ = requests.recv();
            panic!("worker crashed");
        })
        .unwrap();

    let first = dispatcher.generate_spectrogram(AudioInput::Mono(vec![0.0; 8]), Default::default());
    assert_eq!(first.wait(), Err(JobError::BackgroundContextFailure));

    let second =
        dispatcher.generate_spectrogram(AudioInput::Mono(vec![0.0; 8]), Default::default());
    assert_eq!(second.wait(), Err(JobError::BackgroundContextFailure));

    assert_eq!(dispatcher.terminate(), 0);
}
