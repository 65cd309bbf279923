use vidarr::{Config, run};

fn main() -> anyhow::Result<()> {
    let threads = Config::load()?.general.worker_threads;

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if threads > 0 {
        builder.worker_threads(threads);
    }

    builder.build()?.block_on(run())
}
