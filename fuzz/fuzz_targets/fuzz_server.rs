#![no_main]

use libfuzzer_sys::fuzz_target;
use scram_session::{
    CredentialRecord, Dispatcher, ScramServer, ServerConfig, StaticCredentialSource,
    UserCredentialsManager,
};
use std::sync::{Arc, OnceLock};

fn dispatcher() -> Option<&'static Dispatcher> {
    static DISPATCHER: OnceLock<Option<Dispatcher>> = OnceLock::new();
    DISPATCHER
        .get_or_init(|| {
            let record =
                CredentialRecord::from_password("ADM", "benoit", "pw", &[1; 24], 4096).ok()?;
            let manager =
                UserCredentialsManager::load(StaticCredentialSource::new(vec![record])).ok()?;
            let server = ScramServer::new(Arc::new(manager), ServerConfig::default());
            Dispatcher::for_server(Arc::new(server)).ok()
        })
        .as_ref()
}

fuzz_target!(|data: &[u8]| {
    let Some(dispatcher) = dispatcher() else {
        return;
    };
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    // Every reply is either hex or a '!' error, never a panic
    let (operation, payload) = text.split_once(':').unwrap_or(("client-first", text));
    let _ = dispatcher.dispatch(operation, payload);
});
