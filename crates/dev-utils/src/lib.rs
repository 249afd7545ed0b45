use std::path::Path;

use rand::{distributions::Alphanumeric, Rng};

static mut GUARD: Option<tracing_chrome::FlushGuard> = None;

/// Installs a backtrace printer, and when `DEBUG` was set at build time, a
/// tracing subscriber that logs to stderr and records a chrome trace under
/// `./log`.
pub fn setup_test_log() {
    color_backtrace::install();
    use tracing_chrome::ChromeLayerBuilder;
    use tracing_subscriber::{prelude::*, registry::Registry, EnvFilter};
    if option_env!("DEBUG").is_some() {
        // suffix should be current date time
        let time_suffix = chrono::Local::now().format("%Y-%m-%d-%H-%M-%S").to_string();
        std::fs::create_dir_all("./log").unwrap();
        let (chrome_layer, guard) = ChromeLayerBuilder::new()
            .include_args(true)
            .include_locations(true)
            .file(Path::new(
                format!("./log/trace-{}.json", time_suffix).as_str(),
            ))
            .build();
        // SAFETY: Test
        unsafe { GUARD = Some(guard) };
        let _ = tracing::subscriber::set_global_default(
            Registry::default()
                .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trace")))
                .with(
                    tracing_subscriber::fmt::Layer::default()
                        .with_writer(std::io::stderr)
                        .with_line_number(true)
                        .with_file(true),
                )
                .with(chrome_layer),
        );
    }
}

/// A random headword of 1 to `max_len` characters, occasionally with
/// non-ASCII letters.
pub fn random_key<R: Rng>(rng: &mut R, max_len: usize) -> String {
    let len = rng.gen_range(1..=max_len.max(1));
    (0..len)
        .map(|_| match rng.gen_range(0..10) {
            0 => ['é', 'ß', 'ж', '中', 'ü'][rng.gen_range(0..5)],
            _ => rng.sample(Alphanumeric) as char,
        })
        .collect()
}

/// `n` random `(headword, html)` pairs in generation order.
pub fn random_entries<R: Rng>(rng: &mut R, n: usize) -> Vec<(String, String)> {
    (0..n)
        .map(|i| {
            let key = random_key(rng, 24);
            let body: String = (0..rng.gen_range(0..200))
                .map(|_| rng.sample(Alphanumeric) as char)
                .collect();
            (key, format!("<h2>{}</h2><p>{}</p>", i, body))
        })
        .collect()
}

/// `n` random binary blobs keyed like files in a resource archive.
pub fn random_resources<R: Rng>(rng: &mut R, n: usize) -> Vec<(String, Vec<u8>)> {
    (0..n)
        .map(|i| {
            let len = rng.gen_range(0..4096);
            let blob: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
            (format!("\\res\\{}-{}.bin", i, random_key(rng, 8)), blob)
        })
        .collect()
}
