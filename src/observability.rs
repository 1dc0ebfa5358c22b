use biometrics::{Collector, Counter, Moments};

pub(crate) static BACKEND_REQUESTS: Counter = Counter::new("ragchat.backend.requests");
pub(crate) static BACKEND_REQUEST_ERRORS: Counter =
    Counter::new("ragchat.backend.request_errors");
pub(crate) static BACKEND_REQUEST_DURATION: Moments =
    Moments::new("ragchat.backend.request_duration_seconds");

pub(crate) static STREAM_CHUNKS: Counter = Counter::new("ragchat.stream.chunks");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("ragchat.stream.errors");
pub(crate) static STREAM_BYTES: Counter = Counter::new("ragchat.stream.bytes");
pub(crate) static STREAM_DURATION: Moments = Moments::new("ragchat.stream.duration_seconds");

pub(crate) static RETRIEVAL_QUERIES: Counter = Counter::new("ragchat.retrieval.queries");
pub(crate) static RETRIEVAL_ERRORS: Counter = Counter::new("ragchat.retrieval.errors");
pub(crate) static RETRIEVAL_DISCARDS: Counter = Counter::new("ragchat.retrieval.discards");
pub(crate) static RETRIEVAL_EMBEDDING_FALLBACKS: Counter =
    Counter::new("ragchat.retrieval.embedding_fallbacks");

pub(crate) static WEB_SEARCHES: Counter = Counter::new("ragchat.web.searches");
pub(crate) static WEB_SEARCH_ERRORS: Counter = Counter::new("ragchat.web.search_errors");

pub(crate) static SESSION_TURNS: Counter = Counter::new("ragchat.session.turns");
pub(crate) static SESSION_DIRECTIVES: Counter = Counter::new("ragchat.session.directives");
pub(crate) static SESSION_TURN_ERRORS: Counter = Counter::new("ragchat.session.turn_errors");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&BACKEND_REQUESTS);
    collector.register_counter(&BACKEND_REQUEST_ERRORS);
    collector.register_moments(&BACKEND_REQUEST_DURATION);

    collector.register_counter(&STREAM_CHUNKS);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_counter(&STREAM_BYTES);
    collector.register_moments(&STREAM_DURATION);

    collector.register_counter(&RETRIEVAL_QUERIES);
    collector.register_counter(&RETRIEVAL_ERRORS);
    collector.register_counter(&RETRIEVAL_DISCARDS);
    collector.register_counter(&RETRIEVAL_EMBEDDING_FALLBACKS);

    collector.register_counter(&WEB_SEARCHES);
    collector.register_counter(&WEB_SEARCH_ERRORS);

    collector.register_counter(&SESSION_TURNS);
    collector.register_counter(&SESSION_DIRECTIVES);
    collector.register_counter(&SESSION_TURN_ERRORS);
}
