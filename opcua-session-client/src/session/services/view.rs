//! View service set: `Browse`.

use opcua_session_types::{
    BrowseDescription, BrowseRequest, BrowseResult, RequestHeader, ResponseMessage, StatusCode,
};

use crate::session::{process_service_result, process_unexpected_response, session_debug, session_error};
use crate::SessionClient;

impl SessionClient {
    /// Discovers the references of nodes by sending a [`BrowseRequest`] to the server.
    ///
    /// See OPC UA Part 4 - Services 5.8.2 for complete description of the service and error responses.
    ///
    /// # Arguments
    ///
    /// * `nodes_to_browse` - The nodes to browse from.
    /// * `max_references_per_node` - Maximum references to return per node, 0 for no limit.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<BrowseResult>)` - One result per starting node, in request order.
    /// * `Err(StatusCode)` - Request failed, the status code is the reason for failure.
    pub async fn browse(
        &self,
        nodes_to_browse: &[BrowseDescription],
        max_references_per_node: u32,
    ) -> Result<Vec<BrowseResult>, StatusCode> {
        if nodes_to_browse.is_empty() {
            session_error!(self, "browse(), was not supplied with any nodes to browse");
            return Err(StatusCode::BadNothingToDo);
        }
        let request = BrowseRequest {
            request_header: RequestHeader::default(),
            requested_max_references_per_node: max_references_per_node,
            nodes_to_browse: nodes_to_browse.to_vec(),
        };
        let response = self.request(request.into()).await?;
        if let ResponseMessage::Browse(response) = response {
            session_debug!(self, "browse(), success");
            process_service_result(&response.response_header)?;
            Ok(response.results)
        } else {
            session_error!(self, "browse() failed");
            Err(process_unexpected_response(response))
        }
    }
}
