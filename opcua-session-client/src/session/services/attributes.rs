//! Attribute service set: `Read` and `Write`.

use opcua_session_types::{
    DataValue, ReadRequest, ReadValueId, RequestHeader, ResponseMessage, StatusCode,
    TimestampsToReturn, WriteRequest, WriteValue,
};

use crate::session::{process_service_result, process_unexpected_response, session_debug, session_error};
use crate::SessionClient;

impl SessionClient {
    /// Reads the value of nodes by sending a [`ReadRequest`] to the server.
    ///
    /// See OPC UA Part 4 - Services 5.10.2 for complete description of the service and error responses.
    ///
    /// # Arguments
    ///
    /// * `nodes_to_read` - The attributes to read.
    /// * `timestamps_to_return` - Which timestamps to return with each value.
    /// * `max_age` - Maximum acceptable age of the values in milliseconds, 0 forces a fresh read.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<DataValue>)` - One value per requested attribute, in request order.
    /// * `Err(StatusCode)` - Request failed, the status code is the reason for failure.
    pub async fn read(
        &self,
        nodes_to_read: &[ReadValueId],
        timestamps_to_return: TimestampsToReturn,
        max_age: f64,
    ) -> Result<Vec<DataValue>, StatusCode> {
        if nodes_to_read.is_empty() {
            session_error!(self, "read(), was not supplied with any nodes to read");
            return Err(StatusCode::BadNothingToDo);
        }
        let request = ReadRequest {
            request_header: RequestHeader::default(),
            max_age,
            timestamps_to_return,
            nodes_to_read: nodes_to_read.to_vec(),
        };
        let response = self.request(request.into()).await?;
        if let ResponseMessage::Read(response) = response {
            session_debug!(self, "read(), success");
            process_service_result(&response.response_header)?;
            Ok(response.results)
        } else {
            session_error!(self, "read() value failed");
            Err(process_unexpected_response(response))
        }
    }

    /// Writes values to nodes by sending a [`WriteRequest`] to the server.
    ///
    /// See OPC UA Part 4 - Services 5.10.4 for complete description of the service and error responses.
    ///
    /// # Arguments
    ///
    /// * `nodes_to_write` - The values to write.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<StatusCode>)` - One status per written value, in request order.
    /// * `Err(StatusCode)` - Request failed, the status code is the reason for failure.
    pub async fn write(
        &self,
        nodes_to_write: &[WriteValue],
    ) -> Result<Vec<StatusCode>, StatusCode> {
        if nodes_to_write.is_empty() {
            session_error!(self, "write(), was not supplied with any nodes to write");
            return Err(StatusCode::BadNothingToDo);
        }
        let request = WriteRequest {
            request_header: RequestHeader::default(),
            nodes_to_write: nodes_to_write.to_vec(),
        };
        let response = self.request(request.into()).await?;
        if let ResponseMessage::Write(response) = response {
            session_debug!(self, "write(), success");
            process_service_result(&response.response_header)?;
            Ok(response.results)
        } else {
            session_error!(self, "write() failed");
            Err(process_unexpected_response(response))
        }
    }
}
