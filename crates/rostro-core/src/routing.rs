//! Where the presentation layer goes once a comparison has settled.

use reqwest::Url;

use crate::controller::Settled;
use crate::error::FailureClass;
use crate::registry::Registry;
use crate::types::{ComparisonOutcome, ImageHandle, PersonRecord, Similarity};

#[derive(Debug)]
pub enum Route {
    /// Show both images side by side with the matched person's details.
    ShowMatch {
        submitted: ImageHandle,
        stored_image: Url,
        similarity: Similarity,
        person: PersonRecord,
    },
    /// Offer to enroll the unknown face; `image` is the submitted handle.
    OfferEnrollment { image: ImageHandle },
    /// Notify the user and go back to the start. `image` is handed back so
    /// the caller can dispose of it.
    ShowError {
        image: ImageHandle,
        class: FailureClass,
        message: String,
    },
}

pub fn route<R: Registry + ?Sized>(registry: &R, settled: Settled) -> Route {
    let Settled { image, outcome } = settled;
    match outcome {
        ComparisonOutcome::Match { similarity, person } => Route::ShowMatch {
            stored_image: registry.image_url(&person.user_id),
            submitted: image,
            similarity,
            person,
        },
        ComparisonOutcome::NoMatch => Route::OfferEnrollment { image },
        ComparisonOutcome::Failure { reason } => Route::ShowError {
            image,
            class: reason.class(),
            message: format!("could not process the image: {reason}"),
        },
    }
}
