#[cfg(not(debug_assertions))]
pub fn init_logging() {
    use syslog::BasicLogger;

    // RFC 5424 has no log crate integration yet, so 3164 it is
    let logger = syslog::unix(syslog::Formatter3164::default())
        .expect("syslog initialization failed");
    log::set_boxed_logger(Box::new(BasicLogger::new(logger)))
        .map(|()| log::set_max_level(log::STATIC_MAX_LEVEL))
        .expect("syslog initialization failed");
}

#[cfg(debug_assertions)]
pub fn init_logging() {
    env_logger::init()
}
