#[cfg(all(test, feature = "e2e"))]
mod e2e;
