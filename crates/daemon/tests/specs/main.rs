//! Black-box specs for the `lcloudd` binary.

#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

mod prelude;

mod cli {
    mod help;
    mod stage;
}

mod daemon {
    mod config;
    mod install;
    mod ledger;
}
