use genosync::{argparse::set_configs, runner::run};

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

fn main() -> anyhow::Result<()> {
    let config = set_configs();

    run(config)
}
