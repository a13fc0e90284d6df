//! Command implementations, grouped the way they are listed in `help`.

pub mod admin;
pub mod ai;
pub mod android;
pub mod fun;
pub mod misc;
pub mod system;
pub mod tg_tools;
pub mod tools;

use crate::commands::{BotCommand, CommandContext, CommandError};
use android::root_tools;

/// Runs the implementation of `ctx.command`.
///
/// # Errors
///
/// Returns whatever the command failed with; the handler reports it.
pub async fn dispatch(ctx: &CommandContext) -> Result<(), CommandError> {
    match ctx.command {
        BotCommand::Cfban => admin::cfban::fed_ban(ctx, false).await,
        BotCommand::CfbanProof => admin::cfban::fed_ban(ctx, true).await,
        BotCommand::AddFed => admin::feds::add_fed(ctx).await,
        BotCommand::DelFed => admin::feds::del_fed(ctx).await,
        BotCommand::ListFeds => admin::feds::list_feds(ctx).await,
        BotCommand::Dkick => admin::dkick::dkick(ctx).await,
        BotCommand::Title => admin::title::set_title(ctx).await,

        BotCommand::Ask => ai::ask(ctx).await,

        BotCommand::CheckFirmware => android::samsung::check_firmware(ctx).await,
        BotCommand::SamsungName => android::samsung::model_name(ctx).await,
        BotCommand::SamsungSpecs => android::samsung::specs(ctx).await,
        BotCommand::WhatIs => android::xiaomi::what_is(ctx).await,
        BotCommand::Codename => android::xiaomi::codename(ctx).await,
        BotCommand::Specs => android::xiaomi::specs(ctx).await,
        BotCommand::OrangeFox => android::recovery::orangefox(ctx).await,
        BotCommand::Twrp => android::recovery::twrp(ctx).await,
        BotCommand::Magisk => root_tools::latest_releases(ctx, root_tools::MAGISK).await,
        BotCommand::KernelSu => root_tools::latest_releases(ctx, root_tools::KERNELSU).await,
        BotCommand::KernelSuNext => {
            root_tools::latest_releases(ctx, root_tools::KERNELSU_NEXT).await
        }

        BotCommand::Decide => fun::decide::decide(ctx).await,
        BotCommand::Slap => fun::slap::slap(ctx).await,
        BotCommand::Joke => fun::joke::joke(ctx).await,
        BotCommand::Tts => fun::tts::tts(ctx).await,
        BotCommand::Ascii => fun::ascii::ascii(ctx).await,

        BotCommand::Translate => misc::translate::translate(ctx).await,
        BotCommand::Song => misc::song::song(ctx).await,
        BotCommand::CheckUpdate => misc::updates::check_update(ctx).await,
        BotCommand::ModRepo => misc::updates::mod_repo(ctx).await,
        BotCommand::ExtUpdate => misc::updates::ext_update(ctx).await,
        BotCommand::ModGrade => misc::updates::mod_grade(ctx).await,

        BotCommand::Hash => system::hash::hash(ctx).await,

        BotCommand::Quote => tg_tools::quote::quote(ctx).await,
        BotCommand::FetchCreator => tg_tools::fetchcreator::fetch_creator(ctx).await,
        BotCommand::Lock => tg_tools::locks::change_lock(ctx, true).await,
        BotCommand::Unlock => tg_tools::locks::change_lock(ctx, false).await,
        BotCommand::LockTypes => tg_tools::locks::lock_types(ctx).await,
        BotCommand::FedStat => tg_tools::fedstat::fed_stat(ctx).await,
        BotCommand::JoinInfo => tg_tools::joininfo::join_info(ctx).await,
        BotCommand::SaveNote => tg_tools::notes::save_note(ctx).await,
        BotCommand::GetNote => tg_tools::notes::get_note(ctx).await,
        BotCommand::DelNote => tg_tools::notes::delete_note(ctx).await,
        BotCommand::Notes => tg_tools::notes::list_notes(ctx).await,
        BotCommand::Permissions => tg_tools::perms::permissions(ctx).await,

        BotCommand::Cut => tools::cut::cut(ctx).await,

        BotCommand::Help => {
            ctx.reply(BotCommand::help_text(&ctx.settings().command_prefix))
                .await?;
            Ok(())
        }
    }
}
