use crate::domain::lead::LeadInfo;
use crate::domain::session::Session;
use crate::flows::states::{Stage, StageTransition};

/// Merges one turn's extracted info into the session lead, then evaluates at
/// most one stage transition.
///
/// Field assignment is unconditional: a late correction updates the lead even
/// when the current stage asked for something else. The transition trigger is
/// only the info supplied in *this* call, never the accumulated lead state, so
/// a field learned in an earlier turn cannot retroactively unblock a pending
/// transition unless it is re-supplied.
///
/// Not reentrant-safe; callers hold the per-session lock for the whole turn.
pub fn advance(session: &mut Session, info: &LeadInfo) -> Option<StageTransition> {
    session.lead.apply_info(info);

    let next = match session.stage {
        Stage::Initial if info.nome.is_some() => Stage::AskEmail,
        Stage::AskEmail if info.email.is_some() => Stage::AskEmpresa,
        Stage::AskEmpresa if info.empresa.is_some() => Stage::AskNecessidade,
        Stage::AskNecessidade if info.necessidade.is_some() => Stage::AskPrazo,
        Stage::AskPrazo if info.prazo.is_some() => Stage::ConfirmInterest,
        // Confirming either way (true or false) closes field collection.
        Stage::ConfirmInterest if info.interesse_confirmado.is_some() => Stage::Completed,
        _ => return None,
    };

    let from = session.stage;
    session.stage = next;
    Some(StageTransition { from, to: next })
}
