use std::future::Future;
use std::pin::Pin;

use domain::common::error::RunnerError;
use domain::destination::entity::{Destination, DestinationContext};
use domain::settings::AwsSnsSettings;

/// Looks up destination configurations by id.
pub trait DestinationRegistry: Send + Sync {
    fn get<'a>(
        &'a self,
        destination_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Destination, RunnerError>> + Send + 'a>>;
}

/// Delivers a rendered message to a destination.
///
/// Must refuse hosts on the deny list and raise on transport failure; the
/// returned message id is recorded in the action output. Delivery is
/// at-least-once — duplicates are bounded by action throttling, not here.
pub trait DestinationPublisher: Send + Sync {
    #[allow(clippy::too_many_arguments)]
    fn publish<'a>(
        &'a self,
        aws: &'a AwsSnsSettings,
        subject: Option<&'a str>,
        message: &'a str,
        destination: &'a Destination,
        dest_ctx: &'a DestinationContext,
        host_deny_list: &'a [String],
    ) -> Pin<Box<dyn Future<Output = Result<String, RunnerError>> + Send + 'a>>;
}
