// Licensed under the Apache-2.0 license

use crate::events::PldmEvents;
use crate::timer::Timer;
use crate::transport::MAX_PLDM_PAYLOAD_SIZE;
use crate::transport::{PldmSocket, RxPacket};
use log::{debug, error, info, warn};
use pldm_common::codec::PldmCodec;
use pldm_common::message::firmware_update as pldm_packet;
use pldm_common::protocol::base::{
    InstanceId, PldmBaseCompletionCode, PldmMsgHeader, PldmMsgType, PldmSupportedType,
    TransferRespFlag,
};
use pldm_common::protocol::firmware_update::{
    ComponentActivationMethods, ComponentClassification, ComponentCompatibilityResponse,
    ComponentCompatibilityResponseCode, ComponentParameterEntry, ComponentResponseCode,
    FwUpdateCmd, FwUpdateCompletionCode, PldmFirmwareString, UpdateOptionFlags, VersionStringType,
    PLDM_FWUP_IMAGE_SET_VER_STR_MAX_LEN,
};
use pldm_fw_pkg::manifest::{ComponentImageInformation, FirmwareDeviceIdRecord};
use pldm_fw_pkg::FirmwareManifest;
use smlang::statemachine;
use std::sync::mpsc::Sender;
use std::time::Duration;

/// Smallest `length` a firmware device is allowed to request in `RequestFirmwareData`.
pub const BASELINE_TRANSFER_SIZE: u32 = 32;
pub const MAX_TRANSFER_SIZE: u32 = 512;
const MAX_OUTSTANDING_TRANSFER_REQ: u8 = 1;

/// Maximum time between two `RequestFirmwareData` commands during one component transfer.
pub const UA_T2_DEFAULT: Duration = Duration::from_secs(60);
/// Maximum time from a `TransferComplete`/`VerifyComplete` to the next expected completion command.
pub const UA_T6_DEFAULT: Duration = Duration::from_secs(600);

// Define the state machine
statemachine! {
    derive_states: [Debug, Clone],
    derive_events: [Clone, Debug],
    transitions: {
        *Idle + StartUpdate  / on_start_update = QueryDeviceIdentifiersSent,
        QueryDeviceIdentifiersSent + QueryDeviceIdentifiersResponse(pldm_packet::query_devid::QueryDeviceIdentifiersResponse) / on_query_device_identifiers_response = ReceivedQueryDeviceIdentifiers,
        ReceivedQueryDeviceIdentifiers + SendGetFirmwareParameters / on_send_get_firmware_parameters = GetFirmwareParametersSent,
        GetFirmwareParametersSent + GetFirmwareParametersResponse(pldm_packet::get_fw_params::GetFirmwareParametersResponse)  / on_get_firmware_parameters_response = ReceivedFirmwareParameters,
        ReceivedFirmwareParameters + SendRequestUpdate / on_send_request_update = RequestUpdateSent,
        RequestUpdateSent + RequestUpdateResponse(pldm_packet::request_update::RequestUpdateResponse) / on_request_update_response = LearnComponents,
        LearnComponents + SendPassComponentRequest [!are_all_components_passed] / on_send_pass_component_request = LearnComponents,
        LearnComponents + SendPassComponentRequest [are_all_components_passed]  / on_all_components_passed = ReadyXfer,
        LearnComponents + PassComponentResponse(pldm_packet::pass_component::PassComponentTableResponse) / on_pass_component_response = LearnComponents,
        LearnComponents + CancelUpdateOrTimeout  / on_stop_update = Idle,

        // ReadyXfer is the convergence point between components: every component, whether it
        // succeeds, fails or is skipped, returns here so the next one (if any) can start.
        ReadyXfer + SendUpdateComponent / on_send_update_component = ReadyXfer,
        ReadyXfer + UpdateComponentResponse(pldm_packet::update_component::UpdateComponentResponse) / on_update_component_response = ReadyXfer,
        ReadyXfer + StartDownload / on_start_download = Download,
        ReadyXfer + SendActivateFirmware / on_send_activate_firmware = Activate,
        ReadyXfer + SendCancelUpdate / on_send_cancel_update = CancelSent,
        ReadyXfer + CancelUpdateComponent  / on_stop_update = Idle,

        Download + RequestFirmwareData(pldm_packet::request_fw_data::RequestFirmwareDataRequest) / on_request_firmware = Download,
        Download + TransferCompleteFail(pldm_packet::transfer_complete::TransferCompleteRequest) / on_transfer_fail = ReadyXfer,
        Download + TransferCompletePass(pldm_packet::transfer_complete::TransferCompleteRequest) / on_transfer_success = Verify,
        Download + CancelUpdate  / on_stop_update = Idle,

        Verify + VerifyCompletePass(pldm_packet::verify_complete::VerifyCompleteRequest) / on_verify_success = Apply,
        Verify + VerifyCompleteFail(pldm_packet::verify_complete::VerifyCompleteRequest) / on_verify_fail = ReadyXfer,
        Verify + CancelUpdate  / on_stop_update = Idle,

        Apply + ApplyCompletePass(pldm_packet::apply_complete::ApplyCompleteRequest) / on_apply_success = ReadyXfer,
        Apply + ApplyCompleteFail(pldm_packet::apply_complete::ApplyCompleteRequest) / on_apply_fail = ReadyXfer,
        Apply + CancelUpdateComponent  / on_stop_update = Idle,

        Activate + ActivateFirmwareResponse(pldm_packet::activate_fw::ActivateFirmwareResponse) / on_activate_firmware_response = Idle,
        Activate + CancelUpdate  / on_stop_update = Idle,

        CancelSent + CancelUpdateResponse(pldm_packet::request_cancel::CancelUpdateResponse) / on_cancel_update_response = Idle,

        // Fires from a UA_T2/UA_T6 timer; a stale timer landing outside Download/Verify/Apply
        // is a no-op (the in-flight component was already finalized and the timer cancelled).
        _ + ComponentTimeout / on_component_timeout = ReadyXfer,

        _ + StopUpdate / on_stop_update = Done
    }
}

fn send_request_helper<S: PldmSocket, P: PldmCodec>(socket: &S, message: &P) -> Result<(), ()> {
    let mut buffer = [0u8; MAX_PLDM_PAYLOAD_SIZE];
    let sz = message.encode(&mut buffer).map_err(|_| ())?;
    socket.send(&buffer[..sz]).map_err(|_| ())?;
    debug!("Sent request: {:?}", std::any::type_name::<P>());
    Ok(())
}

fn send_response_helper<S: PldmSocket, P: PldmCodec>(socket: &S, message: &P) -> Result<(), ()> {
    let mut buffer = [0u8; MAX_PLDM_PAYLOAD_SIZE];
    let sz = message.encode(&mut buffer).map_err(|_| ())?;
    socket.send(&buffer[..sz]).map_err(|_| ())?;
    debug!("Sent response: {:?}", std::any::type_name::<P>());
    Ok(())
}

/// Same as [`send_response_helper`], but also remembers the exact bytes sent against
/// `(cmd, instance_id)` so a verbatim retry of the same device-initiated command can be
/// answered by replaying this response rather than re-running the action (§4.5 step 7, §8
/// scenario 5: "Retry").
fn send_device_response_and_record<S: PldmSocket, P: PldmCodec>(
    ctx: &mut InnerContext<S>,
    cmd: FwUpdateCmd,
    instance_id: InstanceId,
    message: &P,
) -> Result<(), ()> {
    let mut buffer = [0u8; MAX_PLDM_PAYLOAD_SIZE];
    let sz = message.encode(&mut buffer).map_err(|_| ())?;
    ctx.socket.send(&buffer[..sz]).map_err(|_| ())?;
    ctx.last_device_cmd = Some((cmd, instance_id));
    ctx.last_device_response = Some(buffer[..sz].to_vec());
    debug!("Sent response: {:?}", std::any::type_name::<P>());
    Ok(())
}

/// Which device-initiated command(s), if any, `state` currently accepts (§4.5's per-state
/// sub-protocol: Download accepts chunk pulls and the terminal TransferComplete, Verify/Apply
/// accept only their own completion command).
pub fn expected_device_commands(state: &States) -> &'static [FwUpdateCmd] {
    match state {
        States::Download => &[FwUpdateCmd::RequestFirmwareData, FwUpdateCmd::TransferComplete],
        States::Verify => &[FwUpdateCmd::VerifyComplete],
        States::Apply => &[FwUpdateCmd::ApplyComplete],
        _ => &[],
    }
}

/// How a device-initiated command compares to the current protocol state and the last command
/// actually processed (§4.4 "RetryRequest"/"Invalid" rows, §4.5 step 7, §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceRequestDisposition {
    /// Exactly the `(cmd, instance_id)` last answered: replay the stored response verbatim.
    Retry,
    /// Accepted by the current state: dispatch to the state machine as usual.
    Expected,
    /// Not accepted by the current state and not a retry: reply `COMMAND_NOT_EXPECTED`.
    Unexpected,
}

/// Extracts `(cmd, instance_id)` from a device-initiated event, for the pre-dispatch retry/
/// unexpected-command check. `None` for every UA-initiated response event, timer, or control
/// event -- those are never subject to this gate.
pub fn device_request_identity(event: &Events) -> Option<(FwUpdateCmd, InstanceId)> {
    match event {
        Events::RequestFirmwareData(req) => {
            Some((FwUpdateCmd::RequestFirmwareData, req.hdr.instance_id()))
        }
        Events::TransferCompletePass(req) | Events::TransferCompleteFail(req) => {
            Some((FwUpdateCmd::TransferComplete, req.hdr.instance_id()))
        }
        Events::VerifyCompletePass(req) | Events::VerifyCompleteFail(req) => {
            Some((FwUpdateCmd::VerifyComplete, req.hdr.instance_id()))
        }
        Events::ApplyCompletePass(req) | Events::ApplyCompleteFail(req) => {
            Some((FwUpdateCmd::ApplyComplete, req.hdr.instance_id()))
        }
        _ => None,
    }
}

/// Blocking status probe used on the failure paths of Transfer/Verify/Apply (spec: query the
/// device once before giving up, rather than trusting the failure result blindly).
fn probe_device_status<S: PldmSocket>(socket: &S, instance_id: InstanceId) {
    let request = pldm_packet::get_status::GetStatusRequest::new(instance_id, PldmMsgType::Request);
    if send_request_helper(socket, &request).is_err() {
        warn!("Unable to send GetStatus probe");
        return;
    }
    match socket.receive(Some(Duration::from_secs(5))) {
        Ok(pkt) => match pldm_packet::get_status::GetStatusResponse::decode(
            &pkt.payload.data[..pkt.payload.len],
        ) {
            Ok(resp) => info!(
                "GetStatus probe: current_state={} reason_code={}",
                resp.current_state, resp.reason_code
            ),
            Err(_) => warn!("GetStatus probe: could not decode response"),
        },
        Err(_) => warn!("GetStatus probe: no response from device"),
    }
}

fn is_pkg_descriptor_in_response_descriptor(
    pkg_descriptor: &pldm_fw_pkg::manifest::Descriptor,
    response_descriptor: &pldm_common::protocol::firmware_update::Descriptor,
) -> bool {
    if response_descriptor.descriptor_type != pkg_descriptor.descriptor_type as u16 {
        return false;
    }
    if response_descriptor.descriptor_length != pkg_descriptor.descriptor_data.len() as u16 {
        return false;
    }
    if &response_descriptor.descriptor_data[..response_descriptor.descriptor_length as usize]
        != pkg_descriptor.descriptor_data.as_slice()
    {
        return false;
    }
    true
}

fn is_pkg_device_id_in_response(
    pkg_dev_id: &FirmwareDeviceIdRecord,
    response: &pldm_packet::query_devid::QueryDeviceIdentifiersResponse,
) -> bool {
    if response.descriptor_count < 1 {
        error!("No descriptors in response");
        return false;
    }

    // Check initial descriptor
    if !is_pkg_descriptor_in_response_descriptor(
        &pkg_dev_id.initial_descriptor,
        &response.initial_descriptor,
    ) {
        error!("Initial descriptor does not match");
        return false;
    }

    // Check additional descriptors
    if let Some(additional_descriptors) = &pkg_dev_id.additional_descriptors {
        if response.descriptor_count < additional_descriptors.len() as u8 + 1 {
            error!("Not enough descriptors in response");
            return false;
        }

        for additional_descriptor in additional_descriptors {
            let mut additional_descriptor_in_response = false;
            if let Some(response_descriptors) = &response.additional_descriptors {
                for i in 0..response.descriptor_count {
                    if is_pkg_descriptor_in_response_descriptor(
                        additional_descriptor,
                        &response_descriptors[i as usize],
                    ) {
                        additional_descriptor_in_response = true;
                        break;
                    }
                }
            }

            if !additional_descriptor_in_response {
                error!("Additional descriptor not found in response");
                return false;
            }
        }
    }
    true
}
pub trait StateMachineActions {
    // Guards
    fn are_all_components_passed(&self, ctx: &InnerContext<impl PldmSocket>) -> Result<bool, ()> {
        if ctx.component_response_codes.len() >= ctx.components.len() {
            Ok(true)
        } else {
            Ok(false)
        }
    }

    // Actions
    fn on_start_update(&mut self, ctx: &mut InnerContext<impl PldmSocket>) -> Result<(), ()> {
        send_request_helper(
            &ctx.socket,
            &pldm_packet::query_devid::QueryDeviceIdentifiersRequest::new(
                ctx.instance_id,
                PldmMsgType::Request,
            ),
        )
    }
    fn on_request_update_response(
        &mut self,
        ctx: &mut InnerContext<impl PldmSocket>,
        response: pldm_packet::request_update::RequestUpdateResponse,
    ) -> Result<(), ()> {
        if response.fixed.completion_code == PldmBaseCompletionCode::Success as u8 {
            info!("RequestUpdate response success");
            ctx.event_queue
                .send(PldmEvents::Update(Events::SendPassComponentRequest))
                .map_err(|_| ())?;
            Ok(())
        } else {
            error!("RequestUpdate response failed");
            ctx.event_queue
                .send(PldmEvents::Update(Events::StopUpdate))
                .map_err(|_| ())?;
            Err(())
        }
    }

    fn on_send_pass_component_request(
        &mut self,
        ctx: &mut InnerContext<impl PldmSocket>,
    ) -> Result<(), ()> {
        let num_of_components_to_pass = ctx.components.len();
        let num_components_passed = ctx.component_response_codes.len();

        if num_components_passed >= num_of_components_to_pass {
            info!("All components passed");
            return Ok(());
        }

        let component_idx: usize = num_components_passed;
        let pass_component_flag: TransferRespFlag;

        if num_of_components_to_pass == 0 {
            error!("No components to pass");
            return Err(());
        } else if num_of_components_to_pass == 1 {
            pass_component_flag = TransferRespFlag::StartAndEnd;
        } else if num_components_passed == 0 {
            pass_component_flag = TransferRespFlag::Start;
        } else if num_components_passed < num_of_components_to_pass - 1 {
            pass_component_flag = TransferRespFlag::Middle;
        } else {
            pass_component_flag = TransferRespFlag::End;
        }
        debug!(
            "Passing component: {} Flag: {:?}",
            component_idx, pass_component_flag
        );
        let component = &ctx.components[component_idx];
        let component_version_string = component.version_string.clone().unwrap_or("".to_string());
        let request = pldm_packet::pass_component::PassComponentTableRequest::new(
            ctx.instance_id,
            PldmMsgType::Request,
            pass_component_flag,
            ComponentClassification::try_from(component.classification).map_err(|_| ())?,
            component.identifier,
            ctx.component_classification_indices
                .get(component_idx)
                .copied()
                .unwrap_or(0),
            component.comparison_stamp.unwrap(),
            &PldmFirmwareString {
                str_type: component.version_string_type as u8,
                str_len: component_version_string.len() as u8,
                str_data: {
                    let mut arr = [0u8; PLDM_FWUP_IMAGE_SET_VER_STR_MAX_LEN];
                    arr[..component_version_string.len()]
                        .copy_from_slice(component_version_string.as_bytes());
                    arr
                },
            },
        );
        send_request_helper(&ctx.socket, &request)
    }

    /// Picks the next not-yet-attempted, updatable component and either starts it or, once the
    /// device's applicable components are exhausted, decides Activate vs Cancel.
    fn advance_or_finish(&mut self, ctx: &mut InnerContext<impl PldmSocket>) -> Result<(), ()> {
        let next = ctx
            .component_response_codes
            .iter()
            .enumerate()
            .find(|(i, code)| {
                **code == ComponentResponseCode::CompCanBeUpdated && !ctx.attempted[*i]
            })
            .map(|(i, _)| i);

        match next {
            Some(idx) => {
                ctx.attempted[idx] = true;
                ctx.current_component_index = Some(idx);
                ctx.event_queue
                    .send(PldmEvents::Update(Events::SendUpdateComponent))
                    .map_err(|_| ())
            }
            None => {
                let any_succeeded = ctx.succeeded.iter().any(|s| *s);
                if any_succeeded {
                    info!("All applicable components processed, activating firmware");
                    ctx.event_queue
                        .send(PldmEvents::Update(Events::SendActivateFirmware))
                        .map_err(|_| ())
                } else {
                    warn!("No component succeeded, cancelling update");
                    ctx.event_queue
                        .send(PldmEvents::Update(Events::SendCancelUpdate))
                        .map_err(|_| ())
                }
            }
        }
    }

    fn on_all_components_passed(
        &mut self,
        ctx: &mut InnerContext<impl PldmSocket>,
    ) -> Result<(), ()> {
        self.advance_or_finish(ctx)
    }

    fn on_send_update_component(
        &mut self,
        ctx: &mut InnerContext<impl PldmSocket>,
    ) -> Result<(), ()> {
        if ctx.current_component_index.is_none() {
            error!("No component to update");
            return Err(());
        }
        let component = &ctx.components[ctx.current_component_index.unwrap()];
        // Bit 0 of a component's package options is the force-update request (DSP0267).
        let mut flags = UpdateOptionFlags(0);
        flags.set_request_force_update(component.options & 0x1 != 0);
        let request = pldm_packet::update_component::UpdateComponentRequest::new(
            ctx.instance_id,
            PldmMsgType::Request,
            ComponentClassification::try_from(component.classification).map_err(|_| ())?,
            component.identifier,
            ctx.component_classification_indices
                .get(ctx.current_component_index.unwrap())
                .copied()
                .unwrap_or(0),
            component.comparison_stamp.unwrap_or(0),
            component.size,
            flags,
            &PldmFirmwareString {
                str_type: component.version_string_type as u8,
                str_len: component
                    .version_string
                    .clone()
                    .unwrap_or("".to_string())
                    .len() as u8,
                str_data: {
                    let mut arr = [0u8; PLDM_FWUP_IMAGE_SET_VER_STR_MAX_LEN];
                    if let Some(ref component) = component.version_string {
                        arr[..component.len()].copy_from_slice(component.as_bytes());
                    }
                    arr
                },
            },
        );
        send_request_helper(&ctx.socket, &request)
    }

    fn on_update_component_response(
        &mut self,
        ctx: &mut InnerContext<impl PldmSocket>,
        response: pldm_packet::update_component::UpdateComponentResponse,
    ) -> Result<(), ()> {
        let index = match ctx.current_component_index {
            Some(i) => i,
            None => {
                error!("UpdateComponentResponse with no component in flight");
                return Err(());
            }
        };

        if response.completion_code == PldmBaseCompletionCode::Success as u8
            && response.comp_compatibility_resp
                == ComponentCompatibilityResponse::CompCanBeUpdated as u8
        {
            info!("UpdateComponent response success, start download");
            ctx.event_queue
                .send(PldmEvents::Update(Events::StartDownload))
                .map_err(|_| ())?;
            Ok(())
        } else {
            // Preserve the asymmetry called out by the design: only an identical comparison
            // stamp is a Skip, every other compatibility code is a Failure. Do not extend.
            let resp_code =
                ComponentCompatibilityResponseCode::try_from(response.comp_compatibility_resp_code)
                    .unwrap_or(ComponentCompatibilityResponseCode::NoResponseCode);
            if resp_code == ComponentCompatibilityResponseCode::CompComparisonStampIdentical {
                info!("Component {} already up to date, skipping", index);
                ctx.component_response_codes[index] =
                    ComponentResponseCode::CompComparisonStampIdentical;
            } else {
                error!(
                    "UpdateComponent response rejected for component {}: {:?}",
                    index, resp_code
                );
                ctx.component_response_codes[index] = ComponentResponseCode::CompNotSupported;
            }
            self.advance_or_finish(ctx)
        }
    }

    fn on_query_device_identifiers_response(
        &mut self,
        ctx: &mut InnerContext<impl PldmSocket>,
        response: pldm_packet::query_devid::QueryDeviceIdentifiersResponse,
    ) -> Result<(), ()> {
        for pkg_dev_id in &ctx.pldm_fw_pkg.firmware_device_id_records {
            if is_pkg_device_id_in_response(pkg_dev_id, &response) {
                ctx.device_id = Some(pkg_dev_id.clone());
                break;
            }
        }
        if ctx.device_id.is_some() {
            ctx.event_queue
                .send(PldmEvents::Update(Events::SendGetFirmwareParameters))
                .map_err(|_| ())?;
            Ok(())
        } else {
            error!("No matching device id found");
            ctx.event_queue
                .send(PldmEvents::Update(Events::StopUpdate))
                .map_err(|_| ())?;
            Err(())
        }
    }

    fn on_send_get_firmware_parameters(
        &mut self,
        ctx: &mut InnerContext<impl PldmSocket>,
    ) -> Result<(), ()> {
        send_request_helper(
            &ctx.socket,
            &pldm_packet::get_fw_params::GetFirmwareParametersRequest::new(
                ctx.instance_id,
                PldmMsgType::Request,
            ),
        )
    }

    fn on_send_request_update(
        &mut self,
        ctx: &mut InnerContext<impl PldmSocket>,
    ) -> Result<(), ()> {
        if let Some(dev_id_record) = ctx.device_id.as_ref() {
            let version_string: PldmFirmwareString =
                match dev_id_record.component_image_set_version_string {
                    Some(ref version_string) => PldmFirmwareString {
                        str_type: dev_id_record.component_image_set_version_string_type as u8,
                        str_len: version_string.len() as u8,
                        str_data: {
                            let mut arr = [0u8; PLDM_FWUP_IMAGE_SET_VER_STR_MAX_LEN];
                            arr[..version_string.len()].copy_from_slice(version_string.as_bytes());
                            arr
                        },
                    },
                    None => PldmFirmwareString {
                        str_type: VersionStringType::Unspecified as u8,
                        str_len: 0,
                        str_data: [0u8; PLDM_FWUP_IMAGE_SET_VER_STR_MAX_LEN],
                    },
                };
            send_request_helper(
                &ctx.socket,
                &pldm_packet::request_update::RequestUpdateRequest::new(
                    ctx.instance_id,
                    PldmMsgType::Request,
                    ctx.max_transfer_size,
                    ctx.components.len() as u16,
                    MAX_OUTSTANDING_TRANSFER_REQ,
                    0, // pkg_data_len is optional, not supported
                    &version_string,
                ),
            )
        } else {
            error!("Cannot send RequestUpdate request, no device id found");
            Err(())
        }
    }

    fn find_component_in_package(
        pkg_components: &[pldm_fw_pkg::manifest::ComponentImageInformation],
        comp_entry: &ComponentParameterEntry,
    ) -> Result<usize, ()> {
        // iterate over the components in the package and get the index
        for (i, item) in pkg_components.iter().enumerate() {
            let pkg_component = item;
            if pkg_component.classification != comp_entry.comp_param_entry_fixed.comp_classification
            {
                continue;
            }

            if pkg_component.identifier != comp_entry.comp_param_entry_fixed.comp_identifier {
                continue;
            }
            return Ok(i);
        }

        Err(())
    }

    fn is_in_device_applicable_components(
        comp_index: usize,
        device_id_record: &FirmwareDeviceIdRecord,
    ) -> bool {
        if let Some(applicable_components) = &device_id_record.applicable_components {
            if !applicable_components.is_empty() {
                for item in applicable_components {
                    if *item == comp_index as u8 {
                        return true;
                    }
                }
            }
        }
        false
    }

    fn is_need_component_update(
        pkg_component: &ComponentImageInformation,
        comp_entry: &ComponentParameterEntry,
    ) -> bool {
        if let Some(comp_timestamp) = pkg_component.comparison_stamp {
            let device_comp_timestamp = comp_entry
                .comp_param_entry_fixed
                .active_comp_comparison_stamp;
            info!(
                "Component id: {}, Package timestamp : {} , Device timestamp : {}",
                pkg_component.identifier, comp_timestamp, device_comp_timestamp
            );
            // Bit 0 of a component's package options is the force-update request; it overrides
            // an otherwise up-to-date comparison stamp (DSP0267).
            if comp_timestamp <= device_comp_timestamp && pkg_component.options & 0x1 == 0 {
                info!("Component is already up to date");
                return false;
            }
        }
        true
    }

    fn on_get_firmware_parameters_response(
        &mut self,
        ctx: &mut InnerContext<impl PldmSocket>,
        response: pldm_packet::get_fw_params::GetFirmwareParametersResponse,
    ) -> Result<(), ()> {
        for i in 0..response.parms.params_fixed.comp_count {
            if let Ok(comp_idx) = Self::find_component_in_package(
                &ctx.pldm_fw_pkg.component_image_information,
                &response.parms.comp_param_table[i as usize],
            ) {
                if Self::is_in_device_applicable_components(
                    comp_idx,
                    ctx.device_id.as_ref().unwrap(),
                ) {
                    info!(
                        "Component id: {} is in applicable components",
                        ctx.pldm_fw_pkg.component_image_information[comp_idx].identifier
                    );
                } else {
                    info!(
                        "Component id: {} is not applicable",
                        ctx.pldm_fw_pkg.component_image_information[comp_idx].identifier
                    );
                    continue;
                }
                let component = &ctx.pldm_fw_pkg.component_image_information[comp_idx];
                if Self::is_need_component_update(
                    component,
                    &response.parms.comp_param_table[i as usize],
                ) {
                    info!("Component id: {} will be updated,", component.identifier);
                    ctx.components.push(component.clone());
                    ctx.component_classification_indices.push(
                        response.parms.comp_param_table[i as usize]
                            .comp_param_entry_fixed
                            .comp_classification_index,
                    );
                }
            }
        }

        ctx.attempted = vec![false; ctx.components.len()];
        ctx.succeeded = vec![false; ctx.components.len()];

        if !ctx.components.is_empty() {
            ctx.event_queue
                .send(PldmEvents::Update(Events::SendRequestUpdate))
                .map_err(|_| ())
        } else {
            info!("No component needs update");
            ctx.event_queue
                .send(PldmEvents::Update(Events::StopUpdate))
                .map_err(|_| ())?;
            Err(())
        }
    }

    fn on_pass_component_response(
        &mut self,
        ctx: &mut InnerContext<impl PldmSocket>,
        response: pldm_packet::pass_component::PassComponentTableResponse,
    ) -> Result<(), ()> {
        // If unsuccessful, stop the update
        if response.completion_code != PldmBaseCompletionCode::Success as u8 {
            error!("PassComponent response failed");
            ctx.event_queue
                .send(PldmEvents::Update(Events::StopUpdate))
                .map_err(|_| ())?;
            return Err(());
        }

        // Record the response code
        ctx.component_response_codes
            .push(ComponentResponseCode::try_from(response.comp_resp_code).map_err(|_| ())?);

        // Send the next component info
        ctx.event_queue
            .send(PldmEvents::Update(Events::SendPassComponentRequest))
            .map_err(|_| ())?;

        Ok(())
    }

    fn on_start_download(&mut self, ctx: &mut InnerContext<impl PldmSocket>) -> Result<(), ()> {
        // A new component's download starts a fresh retry/unexpected-command conversation;
        // forget whatever the previous component last answered.
        ctx.last_device_cmd = None;
        ctx.last_device_response = None;
        ctx.t2_timer.schedule(
            ctx.ua_t2,
            ctx.event_queue.clone(),
            |tx: Sender<PldmEvents>| {
                let _ = tx.send(PldmEvents::Update(Events::ComponentTimeout));
            },
        );
        Ok(())
    }

    fn on_request_firmware(
        &mut self,
        ctx: &mut InnerContext<impl PldmSocket>,
        request: pldm_packet::request_fw_data::RequestFirmwareDataRequest,
    ) -> Result<(), ()> {
        let index = match ctx.current_component_index {
            Some(i) => i,
            None => return Err(()),
        };
        let instance_id = request.hdr.instance_id();
        let component = &ctx.components[index];
        let comp_size = component.size;
        let offset = request.offset;
        let length = request.length;

        // Boundary checks per the data-pull protocol.
        if length < BASELINE_TRANSFER_SIZE || length > ctx.max_transfer_size {
            warn!(
                "RequestFirmwareData length {} out of bounds [{}, {}]",
                length, BASELINE_TRANSFER_SIZE, ctx.max_transfer_size
            );
            let response = pldm_packet::request_fw_data::RequestFirmwareDataResponse::new(
                instance_id,
                FwUpdateCompletionCode::InvalidTransferLength as u8,
                &[],
            );
            return send_device_response_and_record(
                ctx,
                FwUpdateCmd::RequestFirmwareData,
                instance_id,
                &response,
            );
        }
        if offset.saturating_add(length) > comp_size.saturating_add(BASELINE_TRANSFER_SIZE) {
            warn!(
                "RequestFirmwareData offset {} + length {} out of range for component size {}",
                offset, length, comp_size
            );
            let response = pldm_packet::request_fw_data::RequestFirmwareDataResponse::new(
                instance_id,
                FwUpdateCompletionCode::DataOutOfRange as u8,
                &[],
            );
            return send_device_response_and_record(
                ctx,
                FwUpdateCmd::RequestFirmwareData,
                instance_id,
                &response,
            );
        }

        let image_data = component.image_data.as_deref().unwrap_or(&[]);
        let mut chunk = vec![0u8; length as usize];
        if offset < comp_size {
            let available = (comp_size - offset).min(length) as usize;
            let start = offset as usize;
            if start + available <= image_data.len() {
                chunk[..available].copy_from_slice(&image_data[start..start + available]);
            }
        }
        // Anything beyond comp_size stays zero-padded.

        let response = pldm_packet::request_fw_data::RequestFirmwareDataResponse::new(
            instance_id,
            PldmBaseCompletionCode::Success as u8,
            &chunk,
        );
        send_device_response_and_record(ctx, FwUpdateCmd::RequestFirmwareData, instance_id, &response)?;

        // Re-arm UA_T2: another chunk request is still expected.
        ctx.t2_timer.schedule(
            ctx.ua_t2,
            ctx.event_queue.clone(),
            |tx: Sender<PldmEvents>| {
                let _ = tx.send(PldmEvents::Update(Events::ComponentTimeout));
            },
        );
        Ok(())
    }

    fn on_transfer_fail(
        &mut self,
        ctx: &mut InnerContext<impl PldmSocket>,
        request: pldm_packet::transfer_complete::TransferCompleteRequest,
    ) -> Result<(), ()> {
        ctx.t2_timer.cancel();
        error!("TransferComplete reported failure: {}", request.tranfer_result);
        let instance_id = request.hdr.instance_id();
        let response = pldm_packet::transfer_complete::TransferCompleteResponse::new(
            instance_id,
            PldmBaseCompletionCode::Success as u8,
        );
        let _ = send_device_response_and_record(ctx, FwUpdateCmd::TransferComplete, instance_id, &response);
        probe_device_status(&ctx.socket, ctx.instance_id);
        if let Some(index) = ctx.current_component_index {
            ctx.component_response_codes[index] = ComponentResponseCode::CompNotSupported;
        }
        self.advance_or_finish(ctx)
    }

    fn on_transfer_success(
        &mut self,
        ctx: &mut InnerContext<impl PldmSocket>,
        request: pldm_packet::transfer_complete::TransferCompleteRequest,
    ) -> Result<(), ()> {
        ctx.t2_timer.cancel();
        info!("TransferComplete success");
        let instance_id = request.hdr.instance_id();
        let response = pldm_packet::transfer_complete::TransferCompleteResponse::new(
            instance_id,
            PldmBaseCompletionCode::Success as u8,
        );
        send_device_response_and_record(ctx, FwUpdateCmd::TransferComplete, instance_id, &response)?;
        ctx.t6_timer.schedule(
            ctx.ua_t6,
            ctx.event_queue.clone(),
            |tx: Sender<PldmEvents>| {
                let _ = tx.send(PldmEvents::Update(Events::ComponentTimeout));
            },
        );
        Ok(())
    }

    fn on_verify_success(
        &mut self,
        ctx: &mut InnerContext<impl PldmSocket>,
        request: pldm_packet::verify_complete::VerifyCompleteRequest,
    ) -> Result<(), ()> {
        ctx.t6_timer.cancel();
        info!("VerifyComplete success");
        let instance_id = request.hdr.instance_id();
        let response = pldm_packet::verify_complete::VerifyCompleteResponse::new(
            instance_id,
            PldmBaseCompletionCode::Success as u8,
        );
        send_device_response_and_record(ctx, FwUpdateCmd::VerifyComplete, instance_id, &response)?;
        ctx.t6_timer.schedule(
            ctx.ua_t6,
            ctx.event_queue.clone(),
            |tx: Sender<PldmEvents>| {
                let _ = tx.send(PldmEvents::Update(Events::ComponentTimeout));
            },
        );
        Ok(())
    }

    fn on_verify_fail(
        &mut self,
        ctx: &mut InnerContext<impl PldmSocket>,
        request: pldm_packet::verify_complete::VerifyCompleteRequest,
    ) -> Result<(), ()> {
        ctx.t6_timer.cancel();
        error!("VerifyComplete reported failure: {}", request.verify_result);
        let instance_id = request.hdr.instance_id();
        let response = pldm_packet::verify_complete::VerifyCompleteResponse::new(
            instance_id,
            PldmBaseCompletionCode::Success as u8,
        );
        let _ = send_device_response_and_record(ctx, FwUpdateCmd::VerifyComplete, instance_id, &response);
        probe_device_status(&ctx.socket, ctx.instance_id);
        if let Some(index) = ctx.current_component_index {
            ctx.component_response_codes[index] = ComponentResponseCode::CompNotSupported;
        }
        self.advance_or_finish(ctx)
    }

    fn on_apply_success(
        &mut self,
        ctx: &mut InnerContext<impl PldmSocket>,
        request: pldm_packet::apply_complete::ApplyCompleteRequest,
    ) -> Result<(), ()> {
        ctx.t6_timer.cancel();
        info!("ApplyComplete success");
        let response = pldm_packet::apply_complete::ApplyCompleteResponse::new(
            request.hdr.instance_id(),
            PldmBaseCompletionCode::Success as u8,
        );
        send_response_helper(&ctx.socket, &response)?;
        probe_device_status(&ctx.socket, ctx.instance_id);
        if let Some(index) = ctx.current_component_index {
            ctx.succeeded[index] = true;
        }
        self.advance_or_finish(ctx)
    }

    fn on_apply_fail(
        &mut self,
        ctx: &mut InnerContext<impl PldmSocket>,
        request: pldm_packet::apply_complete::ApplyCompleteRequest,
    ) -> Result<(), ()> {
        ctx.t6_timer.cancel();
        error!("ApplyComplete reported failure: {}", request.apply_result);
        let response = pldm_packet::apply_complete::ApplyCompleteResponse::new(
            request.hdr.instance_id(),
            PldmBaseCompletionCode::Success as u8,
        );
        let _ = send_response_helper(&ctx.socket, &response);
        probe_device_status(&ctx.socket, ctx.instance_id);
        if let Some(index) = ctx.current_component_index {
            ctx.component_response_codes[index] = ComponentResponseCode::CompNotSupported;
        }
        self.advance_or_finish(ctx)
    }

    fn on_send_activate_firmware(
        &mut self,
        ctx: &mut InnerContext<impl PldmSocket>,
    ) -> Result<(), ()> {
        send_request_helper(
            &ctx.socket,
            &pldm_packet::activate_fw::ActivateFirmwareRequest::new(
                ctx.instance_id,
                PldmMsgType::Request,
                pldm_packet::activate_fw::SelfContainedActivationRequest::ActivateSelfContainedComponents,
            ),
        )
    }

    fn on_activate_firmware_response(
        &mut self,
        ctx: &mut InnerContext<impl PldmSocket>,
        response: pldm_packet::activate_fw::ActivateFirmwareResponse,
    ) -> Result<(), ()> {
        if response.completion_code == PldmBaseCompletionCode::Success as u8 {
            info!(
                "ActivateFirmware accepted, estimated time {}s",
                response.estimated_time_activation
            );
            Ok(())
        } else {
            error!("ActivateFirmware rejected by device");
            Err(())
        }
    }

    fn on_send_cancel_update(
        &mut self,
        ctx: &mut InnerContext<impl PldmSocket>,
    ) -> Result<(), ()> {
        send_request_helper(
            &ctx.socket,
            &pldm_packet::request_cancel::CancelUpdateRequest::new(
                ctx.instance_id,
                PldmMsgType::Request,
            ),
        )
    }

    fn on_cancel_update_response(
        &mut self,
        _ctx: &mut InnerContext<impl PldmSocket>,
        response: pldm_packet::request_cancel::CancelUpdateResponse,
    ) -> Result<(), ()> {
        warn!(
            "CancelUpdate acknowledged, completion_code={}",
            response.completion_code
        );
        Ok(())
    }

    fn on_component_timeout(&mut self, ctx: &mut InnerContext<impl PldmSocket>) -> Result<(), ()> {
        if ctx.current_component_index.is_none() {
            // Stale timer: the component it was guarding already finished.
            return Ok(());
        }
        error!("Component watchdog expired, cancelling component");
        let _ = send_request_helper(
            &ctx.socket,
            &pldm_packet::request_cancel::CancelUpdateComponentRequest::new(
                ctx.instance_id,
                PldmMsgType::Request,
            ),
        );
        if let Some(index) = ctx.current_component_index {
            ctx.component_response_codes[index] = ComponentResponseCode::CompNotSupported;
        }
        self.advance_or_finish(ctx)
    }

    fn on_stop_update(&mut self, ctx: &mut InnerContext<impl PldmSocket>) -> Result<(), ()> {
        ctx.t2_timer.cancel();
        ctx.t6_timer.cancel();
        Ok(())
    }
}

fn packet_to_event<T: PldmCodec>(
    header: &PldmMsgHeader<impl AsRef<[u8]>>,
    packet: &RxPacket,
    is_response: bool,
    event_constructor: fn(T) -> Events,
) -> Result<PldmEvents, ()> {
    debug!("Parsing command: {:?}", std::any::type_name::<T>());
    if is_response && !(header.rq() == 0 && header.datagram() == 0) {
        error!("Not a response");
        return Err(());
    }

    let response = T::decode(&packet.payload.data[..packet.payload.len]).map_err(|_| ())?;
    Ok(PldmEvents::Update(event_constructor(response)))
}

/// Device-initiated requests (the FD pulls data and reports completions) are dispatched
/// differently from UA-initiated responses: the result field embedded in the payload picks
/// between the Pass/Fail event pair, since the state machine itself has no guard access to it.
fn device_request_to_event(
    packet: &RxPacket,
    cmd: FwUpdateCmd,
) -> Result<PldmEvents, ()> {
    match cmd {
        FwUpdateCmd::RequestFirmwareData => packet_to_event(
            &PldmMsgHeader::decode(&packet.payload.data[..packet.payload.len]).map_err(|_| ())?,
            packet,
            false,
            Events::RequestFirmwareData,
        ),
        FwUpdateCmd::TransferComplete => {
            let req = pldm_packet::transfer_complete::TransferCompleteRequest::decode(
                &packet.payload.data[..packet.payload.len],
            )
            .map_err(|_| ())?;
            if req.tranfer_result
                == pldm_packet::transfer_complete::TransferResult::TransferSuccess as u8
            {
                Ok(PldmEvents::Update(Events::TransferCompletePass(req)))
            } else {
                Ok(PldmEvents::Update(Events::TransferCompleteFail(req)))
            }
        }
        FwUpdateCmd::VerifyComplete => {
            let req = pldm_packet::verify_complete::VerifyCompleteRequest::decode(
                &packet.payload.data[..packet.payload.len],
            )
            .map_err(|_| ())?;
            if req.verify_result == pldm_packet::verify_complete::VerifyResult::VerifySuccess as u8
            {
                Ok(PldmEvents::Update(Events::VerifyCompletePass(req)))
            } else {
                Ok(PldmEvents::Update(Events::VerifyCompleteFail(req)))
            }
        }
        FwUpdateCmd::ApplyComplete => {
            let req = pldm_packet::apply_complete::ApplyCompleteRequest::decode(
                &packet.payload.data[..packet.payload.len],
            )
            .map_err(|_| ())?;
            if req.apply_result == pldm_packet::apply_complete::ApplyResult::ApplySuccess as u8
                || req.apply_result
                    == pldm_packet::apply_complete::ApplyResult::ApplySuccessWithActivationMethod
                        as u8
            {
                Ok(PldmEvents::Update(Events::ApplyCompletePass(req)))
            } else {
                Ok(PldmEvents::Update(Events::ApplyCompleteFail(req)))
            }
        }
        _ => Err(()),
    }
}

pub fn process_packet(packet: &RxPacket) -> Result<PldmEvents, ()> {
    debug!("Handling packet: {}", packet);
    let header = PldmMsgHeader::decode(&packet.payload.data[..packet.payload.len])
        .map_err(|_| (error!("Error decoding packet!")))?;
    if !header.is_hdr_ver_valid() {
        error!("Invalid header version!");
        return Err(());
    }
    if header.pldm_type() != PldmSupportedType::FwUpdate as u8 {
        info!("Not a discovery message");
        return Err(());
    }

    // Convert packet to state machine event
    match FwUpdateCmd::try_from(header.cmd_code()) {
        Ok(cmd) => match cmd {
            FwUpdateCmd::QueryDeviceIdentifiers => packet_to_event(
                &header,
                packet,
                true,
                Events::QueryDeviceIdentifiersResponse,
            ),
            FwUpdateCmd::GetFirmwareParameters => {
                packet_to_event(&header, packet, true, Events::GetFirmwareParametersResponse)
            }
            FwUpdateCmd::RequestUpdate => {
                packet_to_event(&header, packet, true, Events::RequestUpdateResponse)
            }
            FwUpdateCmd::PassComponentTable => {
                packet_to_event(&header, packet, true, Events::PassComponentResponse)
            }
            FwUpdateCmd::UpdateComponent => {
                packet_to_event(&header, packet, true, Events::UpdateComponentResponse)
            }
            FwUpdateCmd::ActivateFirmware => {
                packet_to_event(&header, packet, true, Events::ActivateFirmwareResponse)
            }
            FwUpdateCmd::CancelUpdate => {
                packet_to_event(&header, packet, true, Events::CancelUpdateResponse)
            }
            FwUpdateCmd::RequestFirmwareData
            | FwUpdateCmd::TransferComplete
            | FwUpdateCmd::VerifyComplete
            | FwUpdateCmd::ApplyComplete => device_request_to_event(packet, cmd),
            _ => {
                debug!("Unknown firmware update command");
                Err(())
            }
        },
        Err(_) => Err(()),
    }
}

// Implement the context struct
pub struct DefaultActions;
impl StateMachineActions for DefaultActions {}

pub struct InnerContext<S: PldmSocket> {
    socket: S,
    pub pldm_fw_pkg: FirmwareManifest,
    pub event_queue: Sender<PldmEvents>,
    instance_id: InstanceId,
    // Largest `length` this agent will accept in a RequestFirmwareData reply.
    pub max_transfer_size: u32,
    // UA_T2: re-armed on every RequestFirmwareData/TransferComplete, fires ComponentTimeout
    // if the device goes quiet mid-transfer (§4.5 steps 3-6).
    pub ua_t2: Duration,
    // UA_T6: armed once a component finishes downloading, fires ComponentTimeout if
    // Verify/Apply/Activate never completes (§4.5 steps 3-6).
    pub ua_t6: Duration,
    // The device id of the firmware device
    pub device_id: Option<FirmwareDeviceIdRecord>,
    // The components that need to be updated
    pub components: Vec<ComponentImageInformation>,
    // The device responses to the component info passed
    pub component_response_codes: Vec<ComponentResponseCode>,
    // Per-component classification index as returned by GetFirmwareParameters, aligned with `components`
    pub component_classification_indices: Vec<u8>,
    // Whether UpdateComponent has already been sent for this index
    pub attempted: Vec<bool>,
    // Whether this component finished with ApplyComplete success
    pub succeeded: Vec<bool>,
    // The current component being updated
    // This an index to the components vector
    pub current_component_index: Option<usize>,
    pub t2_timer: Timer,
    pub t6_timer: Timer,
    // The last device-initiated command this component answered, and the exact response bytes
    // sent for it -- replayed verbatim if the device retries the same command (§4.5 step 7).
    last_device_cmd: Option<(FwUpdateCmd, InstanceId)>,
    last_device_response: Option<Vec<u8>>,
}

impl<S: PldmSocket> InnerContext<S> {
    /// Classifies an inbound device-initiated command against the current protocol state and
    /// whatever this component last answered (§4.4/§4.5/§7).
    pub fn classify_device_request(
        &self,
        state: &States,
        cmd: FwUpdateCmd,
        instance_id: InstanceId,
    ) -> DeviceRequestDisposition {
        if self.last_device_cmd == Some((cmd, instance_id)) {
            DeviceRequestDisposition::Retry
        } else if expected_device_commands(state).contains(&cmd) {
            DeviceRequestDisposition::Expected
        } else {
            DeviceRequestDisposition::Unexpected
        }
    }

    /// Resends the exact bytes last sent for a device-initiated command, without touching any
    /// state (§8 scenario 5: "Retry").
    pub fn replay_last_response(&self) -> Result<(), ()> {
        match &self.last_device_response {
            Some(bytes) => self.socket.send(bytes).map_err(|_| ()),
            None => Err(()),
        }
    }

    /// Replies `COMMAND_NOT_EXPECTED` to a device-initiated command the current state doesn't
    /// accept, and does not record it as the last-answered command (a genuine retry of this
    /// same wrong command gets the same rejection again, not a state change) (§4.5 step 7, §7,
    /// §8 scenario 4).
    pub fn reply_command_not_expected(&self, cmd: FwUpdateCmd, instance_id: InstanceId) -> Result<(), ()> {
        let code = FwUpdateCompletionCode::CommandNotExpected as u8;
        match cmd {
            FwUpdateCmd::RequestFirmwareData => send_response_helper(
                &self.socket,
                &pldm_packet::request_fw_data::RequestFirmwareDataResponse::new(
                    instance_id,
                    code,
                    &[],
                ),
            ),
            FwUpdateCmd::TransferComplete => send_response_helper(
                &self.socket,
                &pldm_packet::transfer_complete::TransferCompleteResponse::new(instance_id, code),
            ),
            FwUpdateCmd::VerifyComplete => send_response_helper(
                &self.socket,
                &pldm_packet::verify_complete::VerifyCompleteResponse::new(instance_id, code),
            ),
            FwUpdateCmd::ApplyComplete => send_response_helper(
                &self.socket,
                &pldm_packet::apply_complete::ApplyCompleteResponse::new(instance_id, code),
            ),
            _ => Err(()),
        }
    }
}

pub struct Context<T: StateMachineActions, S: PldmSocket> {
    inner: T,
    pub inner_ctx: InnerContext<S>,
}

impl<T: StateMachineActions, S: PldmSocket> Context<T, S> {
    pub fn new(
        context: T,
        socket: S,
        pldm_fw_pkg: FirmwareManifest,
        event_queue: Sender<PldmEvents>,
    ) -> Self {
        Self::with_max_transfer_size(context, socket, pldm_fw_pkg, event_queue, MAX_TRANSFER_SIZE)
    }

    pub fn with_max_transfer_size(
        context: T,
        socket: S,
        pldm_fw_pkg: FirmwareManifest,
        event_queue: Sender<PldmEvents>,
        max_transfer_size: u32,
    ) -> Self {
        Self::with_timing(
            context,
            socket,
            pldm_fw_pkg,
            event_queue,
            max_transfer_size,
            UA_T2_DEFAULT,
            UA_T6_DEFAULT,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn with_timing(
        context: T,
        socket: S,
        pldm_fw_pkg: FirmwareManifest,
        event_queue: Sender<PldmEvents>,
        max_transfer_size: u32,
        ua_t2: Duration,
        ua_t6: Duration,
    ) -> Self {
        Self {
            inner: context,
            inner_ctx: InnerContext {
                socket,
                pldm_fw_pkg,
                event_queue,
                instance_id: 0,
                max_transfer_size,
                ua_t2,
                ua_t6,
                device_id: None,
                components: Vec::new(),
                component_response_codes: Vec::new(),
                component_classification_indices: Vec::new(),
                attempted: Vec::new(),
                succeeded: Vec::new(),
                current_component_index: None,
                t2_timer: Timer::new(),
                t6_timer: Timer::new(),
                last_device_cmd: None,
                last_device_response: None,
            },
        }
    }
}

// Macros to delegate the state machine actions to the custom StateMachineActions passed to the state machine
// This allows overriding the implementation of the actions and guards
macro_rules! delegate_to_inner_action {
    ($($fn_name:ident ($($arg:ident : $arg_ty:ty),*) -> $ret:ty),* $(,)?) => {
        $(
            fn $fn_name(&mut self, $($arg: $arg_ty),*) -> $ret {
                debug!("Fw Upgrade Action: {}", stringify!($fn_name));
                self.inner.$fn_name(&mut self.inner_ctx, $($arg),*)
            }
        )*
    };
}

macro_rules! delegate_to_inner_guard {
    ($($fn_name:ident ($($arg:ident : $arg_ty:ty),*) -> $ret:ty),* $(,)?) => {
        $(
            fn $fn_name(&self, $($arg: $arg_ty),*) -> $ret {
                debug!("Fw Upgrade Guard: {}", stringify!($fn_name));
                self.inner.$fn_name(&self.inner_ctx, $($arg),*)
            }
        )*
    };
}

impl<T: StateMachineActions, S: PldmSocket> StateMachineContext for Context<T, S> {
    // Actions with packet events
    delegate_to_inner_action! {
        on_start_update() -> Result<(),()>,
        on_query_device_identifiers_response(response : pldm_packet::query_devid::QueryDeviceIdentifiersResponse) -> Result<(),()>,
        on_send_get_firmware_parameters() -> Result<(),()>,
        on_send_request_update() -> Result<(),()>,
        on_get_firmware_parameters_response(response : pldm_packet::get_fw_params::GetFirmwareParametersResponse) -> Result<(), ()>,
        on_request_update_response(response: pldm_packet::request_update::RequestUpdateResponse) -> Result<(),()>,
        on_send_pass_component_request() -> Result<(),()>,
        on_all_components_passed() -> Result<(),()>,
        on_send_update_component() -> Result<(),()>,
        on_pass_component_response(response : pldm_packet::pass_component::PassComponentTableResponse) -> Result<(),()>,
        on_start_download() -> Result<(),()>,
        on_update_component_response(response : pldm_packet::update_component::UpdateComponentResponse) -> Result<(),()>,
        on_request_firmware(request: pldm_packet::request_fw_data::RequestFirmwareDataRequest) -> Result<(),()>,
        on_transfer_fail(request: pldm_packet::transfer_complete::TransferCompleteRequest) -> Result<(),()>,
        on_transfer_success(request: pldm_packet::transfer_complete::TransferCompleteRequest) -> Result<(),()>,
        on_verify_success(request: pldm_packet::verify_complete::VerifyCompleteRequest) -> Result<(),()>,
        on_verify_fail(request: pldm_packet::verify_complete::VerifyCompleteRequest) -> Result<(),()>,
        on_apply_success(request: pldm_packet::apply_complete::ApplyCompleteRequest) -> Result<(),()>,
        on_apply_fail(request: pldm_packet::apply_complete::ApplyCompleteRequest) -> Result<(),()>,
        on_send_activate_firmware() -> Result<(),()>,
        on_activate_firmware_response(response: pldm_packet::activate_fw::ActivateFirmwareResponse) -> Result<(),()>,
        on_send_cancel_update() -> Result<(),()>,
        on_cancel_update_response(response: pldm_packet::request_cancel::CancelUpdateResponse) -> Result<(),()>,
        on_component_timeout() -> Result<(),()>,
        on_stop_update() -> Result<(),()>,
    }

    // Guards
    delegate_to_inner_guard! {
        are_all_components_passed() -> Result<bool, ()>,
    }
}
