// Copyright 2024 Canonical Ltd.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

mod cli;
mod cluster;
mod conf;
mod haproxy;
mod hooks;
mod host;
mod https;
mod juju;
mod openstack;
mod util;

#[cfg(test)]
mod mock;

use slog::Drain;
use slog_scope::{debug, error};

fn main() {
    // setup logging; hook output ends up in the framework log
    let decorator = slog_term::TermDecorator::new().stderr().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    let log = slog::Logger::root(drain, slog::o!());
    let guard = slog_scope::set_global_logger(log);

    debug!("logging initialized");

    let code = match cli::parse_args(std::env::args()).and_then(|cfg| cfg.run()) {
        Ok(()) => 0,
        Err(e) => {
            error!("{:#}", e);
            1
        }
    };
    // flush the async drain before exiting
    drop(guard);
    std::process::exit(code);
}
