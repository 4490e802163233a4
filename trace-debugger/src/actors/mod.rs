pub mod detail_resolver;

pub use detail_resolver::{
    await_detail, detail_stats, evict_detail, get_detail, request_detail, resolve_detail,
    DetailResolverActor, DetailResolverArguments, DetailResolverMsg,
};
